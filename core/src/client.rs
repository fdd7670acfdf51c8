//! Session handle, login and the request core.
//!
//! # Design
//! `FmService` holds the normalized base URL and the transport that carries
//! the authenticated cookie state. It is immutable after login. Each
//! operation is split the same way: a `build_*` step produces an
//! `HttpRequest`, the transport executes it, and a parse step interprets the
//! `HttpResponse`. The build and parse steps are public so hosts that do
//! their own I/O can drive them directly.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{ClientConfig, EmptyBody};
use crate::error::{FmError, FmRequestError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{encode_query, Query};
use crate::transport::{Transport, UreqTransport};

/// Login endpoint, relative to the service URL.
pub const LOGIN_PATH: &str = "Authentication_JSON_AppService.axd/Login";

const JSON_CONTENT_TYPE: &str = "application/json";

/// User credentials for [`FmService::login`].
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    fn is_missing(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, str::is_empty);
        blank(&self.username) && blank(&self.password)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    create_persistent_cookie: bool,
}

/// Everything needed to issue one request against a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Resource path relative to the service URL. May carry OData key
    /// syntax such as `Ticket(5)`.
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
    /// Extra headers; a name matching a default header replaces it.
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` into the request payload.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, FmError> {
        self.body = Some(serde_json::to_value(body).map_err(FmError::Serialization)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// An authenticated connection to a facility-management service.
#[derive(Clone)]
pub struct FmService {
    url: String,
    transport: Arc<dyn Transport>,
    empty_body: EmptyBody,
}

impl fmt::Debug for FmService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FmService")
            .field("url", &self.url)
            .field("empty_body", &self.empty_body)
            .finish_non_exhaustive()
    }
}

impl FmService {
    /// Wraps an already-authenticated transport. Trailing slashes are
    /// stripped from `url`.
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: normalize_url(url),
            transport,
            empty_body: EmptyBody::default(),
        }
    }

    /// Logs in with a fresh [`UreqTransport`] built from `config`, so the
    /// returned session owns a cookie jar nobody else sees.
    pub fn login(
        config: &ClientConfig,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Self, FmError> {
        let transport = Arc::new(UreqTransport::new(config));
        let service = Self::login_with(transport, url, credentials)?;
        Ok(service.with_empty_body(config.empty_body))
    }

    /// Logs in through `transport`. On success the transport holds the
    /// session cookies and the returned handle reuses it for every call.
    pub fn login_with(
        transport: Arc<dyn Transport>,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Self, FmError> {
        let request = build_login_request(url, credentials)?;
        let response = transport.execute(&request).map_err(FmError::Transport)?;
        parse_login_response(&response)?;

        let service = Self::new(url, transport);
        info!(url = %service.url, "logged in to facility-management service");
        Ok(service)
    }

    pub fn with_empty_body(mut self, empty_body: EmptyBody) -> Self {
        self.empty_body = empty_body;
        self
    }

    /// Normalized base URL, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Builds the absolute request for `descriptor` without sending it.
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, FmError> {
        if self.url.is_empty() {
            return Err(FmError::required("url"));
        }
        if descriptor.path.is_empty() {
            return Err(FmError::required("path"));
        }

        let qs = encode_query(&descriptor.query);
        let url = if qs.is_empty() {
            format!("{}/{}", self.url, descriptor.path)
        } else {
            format!("{}/{}?{qs}", self.url, descriptor.path)
        };

        let body = match (&descriptor.body, self.empty_body) {
            (Some(body), _) => {
                Some(serde_json::to_string(body).map_err(FmError::Serialization)?)
            }
            (None, EmptyBody::Null) => Some("null".to_string()),
            (None, EmptyBody::Omit) => None,
        };

        Ok(HttpRequest {
            method: descriptor.method,
            url,
            headers: merge_headers(&descriptor.headers),
            body,
        })
    }

    /// Builds, executes and parses one request.
    pub fn send(&self, descriptor: &RequestDescriptor) -> Result<Value, FmError> {
        let request = self.build_request(descriptor)?;
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(&request).map_err(FmError::Transport)?;
        debug!(status = response.status, "received response");
        parse_response(&response)
    }

    pub fn get(&self, path: &str, query: Query) -> Result<Value, FmError> {
        self.send(&RequestDescriptor::new(HttpMethod::Get, path).query(query))
    }

    pub fn post(&self, path: &str, query: Query, body: Option<Value>) -> Result<Value, FmError> {
        self.send(&with_body(HttpMethod::Post, path, query, body))
    }

    pub fn put(&self, path: &str, query: Query, body: Option<Value>) -> Result<Value, FmError> {
        self.send(&with_body(HttpMethod::Put, path, query, body))
    }

    pub fn patch(&self, path: &str, query: Query, body: Option<Value>) -> Result<Value, FmError> {
        self.send(&with_body(HttpMethod::Patch, path, query, body))
    }

    pub fn delete(&self, path: &str, query: Query, body: Option<Value>) -> Result<Value, FmError> {
        self.send(&with_body(HttpMethod::Delete, path, query, body))
    }
}

fn with_body(method: HttpMethod, path: &str, query: Query, body: Option<Value>) -> RequestDescriptor {
    RequestDescriptor {
        body,
        ..RequestDescriptor::new(method, path).query(query)
    }
}

fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn merge_headers(extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), JSON_CONTENT_TYPE.to_string()),
        ("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()),
    ];
    for (name, value) in extra {
        match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => *slot = (name.clone(), value.clone()),
            None => headers.push((name.clone(), value.clone())),
        }
    }
    headers
}

/// Builds the login call for `url`. Fails before any I/O when the URL or
/// both credentials are missing.
pub fn build_login_request(url: &str, credentials: &Credentials) -> Result<HttpRequest, FmError> {
    if url.is_empty() {
        return Err(FmError::required("url"));
    }
    if credentials.is_missing() {
        return Err(FmError::required("username/password"));
    }

    let body = LoginBody {
        user_name: credentials.username.as_deref(),
        password: credentials.password.as_deref(),
        create_persistent_cookie: false,
    };
    let body = serde_json::to_string(&body).map_err(FmError::Serialization)?;

    Ok(HttpRequest {
        method: HttpMethod::Post,
        url: format!("{}/{LOGIN_PATH}", normalize_url(url)),
        headers: merge_headers(&[]),
        body: Some(body),
    })
}

/// Validates the login response. The body is not inspected on success.
pub fn parse_login_response(response: &HttpResponse) -> Result<(), FmError> {
    check_response(response, None)
}

/// Interprets the response of a general request: 204 yields an empty
/// object whatever the body holds, any other success is decoded as JSON.
pub fn parse_response(response: &HttpResponse) -> Result<Value, FmError> {
    check_response(response, None)?;
    if response.status == 204 {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(&response.body).map_err(FmError::Deserialization)
}

/// Turns a non-2xx response into a [`FmRequestError`].
///
/// A JSON error body contributes its `error` member, or the whole document
/// when that member is absent or falsy. Bodies that are not JSON, or fail to
/// parse, leave the payload empty; the status is always reported.
pub fn check_response(response: &HttpResponse, message: Option<&str>) -> Result<(), FmError> {
    if response.is_success() {
        return Ok(());
    }

    let is_json = response
        .header("content-type")
        .is_some_and(|ct| ct.contains(JSON_CONTENT_TYPE));
    let error = if is_json {
        match serde_json::from_str::<Value>(&response.body) {
            Ok(body) => error_payload(body),
            Err(err) => {
                debug!(status = response.status, error = %err, "error body is not valid JSON");
                None
            }
        }
    } else {
        None
    };

    Err(FmRequestError::new(response.status, error, message).into())
}

fn error_payload(body: Value) -> Option<Value> {
    let payload = match body.get("error") {
        Some(inner) if is_truthy(inner) => inner.clone(),
        _ => body,
    };
    (!payload.is_null()).then_some(payload)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
