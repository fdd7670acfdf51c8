//! The I/O side of the host-does-IO split.
//!
//! # Design
//! A [`Transport`] turns an [`HttpRequest`] into an [`HttpResponse`] and
//! nothing more: it must hand back 4xx/5xx responses as data so the
//! response validator can normalize them. A transport is also the session
//! context. It owns whatever cookie state the login call established, so
//! one transport instance must not be shared between unrelated sessions.

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes HTTP round-trips for one logical session.
///
/// Implementations must be safe for concurrent use; requests issued
/// through clones of the same session run against the same transport.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a `ureq::Agent` with its own cookie jar.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout());
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        Self {
            agent: builder.build().new_agent(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = match &request.body {
            Some(body) => self.agent.run(builder.body(body.clone())?)?,
            None => self.agent.run(builder.body(())?)?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // An unreadable body on a failed call must not hide the status.
        let body = match response.body_mut().read_to_string() {
            Ok(body) => body,
            Err(err) if !(200..300).contains(&status) => {
                debug!(status, error = %err, "discarding unreadable error body");
                String::new()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
