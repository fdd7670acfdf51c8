//! In-process stand-in for a facility-management service.
//!
//! Serves the cookie-based login endpoint, a small `ServiceDesk/Ticket`
//! OData entity set and a couple of diagnostic routes used by client tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const AUTH_COOKIE: &str = ".ASPXAUTH";

const TICKET_SET: &str = "Ticket";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ticket {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub create_persistent_cookie: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewTicket {
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TicketPatch {
    pub title: Option<String>,
    pub status: Option<String>,
}

fn default_status() -> String {
    "Open".to_string()
}

#[derive(Default)]
pub struct Db {
    sessions: RwLock<HashSet<String>>,
    tickets: RwLock<BTreeMap<i64, Ticket>>,
}

pub type SharedDb = Arc<Db>;

fn seed() -> BTreeMap<i64, Ticket> {
    [
        (1, "Leaking tap", "Open"),
        (2, "Broken window", "Closed"),
        (3, "Flickering light", "Open"),
    ]
    .into_iter()
    .map(|(id, title, status)| {
        let ticket = Ticket {
            id,
            code: format!("T-{id}"),
            title: title.to_string(),
            status: status.to_string(),
        };
        (id, ticket)
    })
    .collect()
}

pub fn app() -> Router {
    let db: SharedDb = Arc::new(Db {
        sessions: RwLock::default(),
        tickets: RwLock::new(seed()),
    });
    Router::new()
        .route("/Authentication_JSON_AppService.axd/Login", post(login))
        .route(
            "/OData/ServiceDesk/{segment}",
            get(read_tickets)
                .post(create_ticket)
                .patch(update_ticket)
                .delete(delete_ticket),
        )
        .route("/api/echo", any(echo))
        .route("/api/broken", get(broken))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Error body in the shape the real service uses.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", format!("{what} was not found"))
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": { "code": self.code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

async fn login(State(db): State<SharedDb>, Json(input): Json<LoginRequest>) -> ApiResult {
    let valid = input.user_name.as_deref() == Some(USERNAME)
        && input.password.as_deref() == Some(PASSWORD);
    if !valid {
        tracing::info!(user = ?input.user_name, "rejected login");
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "InvalidCredentials",
            "The user name or password is incorrect.",
        ));
    }

    let token = Uuid::new_v4().simple().to_string();
    db.sessions.write().await.insert(token.clone());
    tracing::info!(persistent = input.create_persistent_cookie, "issued session");
    let cookie = format!("{AUTH_COOKIE}={token}; Path=/; HttpOnly");
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(true)).into_response())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

async fn authorize(db: &Db, headers: &HeaderMap) -> Result<(), ApiError> {
    let authorized = match cookie_value(headers, AUTH_COOKIE) {
        Some(token) => db.sessions.read().await.contains(token),
        None => false,
    };
    if authorized {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Authentication required.",
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Key {
    Id(i64),
    Code(String),
}

/// Splits `Ticket` / `Ticket(5)` / `Ticket('T-1')` into set name and key.
fn parse_segment(segment: &str) -> Result<(&str, Option<Key>), ApiError> {
    let Some(open) = segment.find('(') else {
        return Ok((segment, None));
    };
    let set = &segment[..open];
    let inner = segment[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ApiError::bad_request(format!("malformed key in '{segment}'")))?;
    let key = match inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(literal) => Key::Code(literal.replace("''", "'")),
        None => Key::Id(
            inner
                .parse()
                .map_err(|_| ApiError::bad_request(format!("invalid key '{inner}'")))?,
        ),
    };
    Ok((set, Some(key)))
}

fn ticket_set(set: &str) -> Result<(), ApiError> {
    if set == TICKET_SET {
        Ok(())
    } else {
        Err(ApiError::not_found(&format!("entity set '{set}'")))
    }
}

fn find_id(tickets: &BTreeMap<i64, Ticket>, key: &Key) -> Option<i64> {
    match key {
        Key::Id(id) => tickets.contains_key(id).then_some(*id),
        Key::Code(code) => tickets.values().find(|t| t.code == *code).map(|t| t.id),
    }
}

fn entity_json(ticket: &Ticket) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "odata.id".to_string(),
        json!(format!("OData/ServiceDesk/Ticket({})", ticket.id)),
    );
    if let Ok(Value::Object(fields)) = serde_json::to_value(ticket) {
        map.extend(fields);
    }
    map
}

/// `Field eq 'text'` or `Field eq 42`; anything else is rejected.
fn matches_filter(ticket: &Value, filter: &str) -> Result<bool, ApiError> {
    let (field, literal) = filter
        .split_once(" eq ")
        .ok_or_else(|| ApiError::bad_request(format!("unsupported filter '{filter}'")))?;
    let literal = literal.trim();
    let expected = match literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(text) => json!(text.replace("''", "'")),
        None => {
            let number: i64 = literal
                .parse()
                .map_err(|_| ApiError::bad_request(format!("invalid literal '{literal}'")))?;
            json!(number)
        }
    };
    Ok(ticket.get(field.trim()) == Some(&expected))
}

fn parse_count(params: &HashMap<String, String>, name: &str) -> Result<Option<usize>, ApiError> {
    params
        .get(name)
        .map(|v| {
            v.parse()
                .map_err(|_| ApiError::bad_request(format!("{name} must be a non-negative integer")))
        })
        .transpose()
}

async fn read_tickets(
    State(db): State<SharedDb>,
    Path(segment): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    authorize(&db, &headers).await?;
    let (set, key) = parse_segment(&segment)?;
    ticket_set(set)?;
    let tickets = db.tickets.read().await;

    if let Some(key) = key {
        let id = find_id(&tickets, &key).ok_or_else(|| ApiError::not_found(&segment))?;
        let mut entity = Map::new();
        entity.insert(
            "odata.metadata".to_string(),
            json!("OData/$metadata#ServiceDesk/Ticket/@Element"),
        );
        entity.extend(entity_json(&tickets[&id]));
        return Ok(Json(Value::Object(entity)).into_response());
    }

    let mut rows: Vec<Value> = tickets
        .values()
        .map(|t| Value::Object(entity_json(t)))
        .collect();
    if let Some(filter) = params.get("$filter") {
        let mut kept = Vec::new();
        for row in rows {
            if matches_filter(&row, filter)? {
                kept.push(row);
            }
        }
        rows = kept;
    }
    if let Some(order_by) = params.get("$orderby") {
        let mut parts = order_by.split_whitespace();
        let field = parts.next().unwrap_or_default().to_string();
        let descending = parts.next() == Some("desc");
        rows.sort_by(|a, b| {
            let ordering = a[&field].to_string().cmp(&b[&field].to_string());
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    let skip = parse_count(&params, "$skip")?.unwrap_or(0);
    let top = parse_count(&params, "$top")?.unwrap_or(usize::MAX);
    let value: Vec<Value> = rows.into_iter().skip(skip).take(top).collect();

    Ok(Json(json!({
        "odata.metadata": "OData/$metadata#ServiceDesk/Ticket",
        "value": value,
    }))
    .into_response())
}

async fn create_ticket(
    State(db): State<SharedDb>,
    Path(segment): Path<String>,
    headers: HeaderMap,
    Json(input): Json<NewTicket>,
) -> ApiResult {
    authorize(&db, &headers).await?;
    let (set, key) = parse_segment(&segment)?;
    ticket_set(set)?;
    if key.is_some() {
        return Err(ApiError::bad_request("cannot POST to an entity"));
    }

    let mut tickets = db.tickets.write().await;
    let id = tickets.keys().next_back().copied().unwrap_or(0) + 1;
    let ticket = Ticket {
        id,
        code: format!("T-{id}"),
        title: input.title,
        status: input.status,
    };
    tickets.insert(id, ticket.clone());
    Ok((StatusCode::CREATED, Json(Value::Object(entity_json(&ticket)))).into_response())
}

async fn update_ticket(
    State(db): State<SharedDb>,
    Path(segment): Path<String>,
    headers: HeaderMap,
    Json(input): Json<TicketPatch>,
) -> ApiResult {
    authorize(&db, &headers).await?;
    let (set, key) = parse_segment(&segment)?;
    ticket_set(set)?;
    let key = key.ok_or_else(|| ApiError::bad_request("an entity key is required"))?;

    let mut tickets = db.tickets.write().await;
    let id = find_id(&tickets, &key).ok_or_else(|| ApiError::not_found(&segment))?;
    let ticket = tickets
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(&segment))?;
    if let Some(title) = input.title {
        ticket.title = title;
    }
    if let Some(status) = input.status {
        ticket.status = status;
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_ticket(
    State(db): State<SharedDb>,
    Path(segment): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    authorize(&db, &headers).await?;
    let (set, key) = parse_segment(&segment)?;
    ticket_set(set)?;
    let key = key.ok_or_else(|| ApiError::bad_request("an entity key is required"))?;

    let mut tickets = db.tickets.write().await;
    let id = find_id(&tickets, &key).ok_or_else(|| ApiError::not_found(&segment))?;
    tickets.remove(&id);
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Reflects what the server received, for request-shape assertions.
async fn echo(
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: String,
) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "accept": header("accept"),
        "contentType": header("content-type"),
        "trace": header("x-trace"),
        "body": (!body.is_empty()).then_some(body),
    }))
}

async fn broken() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain")],
        "upstream exploded",
    )
        .into_response()
}
