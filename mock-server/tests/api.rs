use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, Ticket, AUTH_COOKIE, PASSWORD, USERNAME};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn authed(method: &str, uri: &str, cookie: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::COOKIE, cookie)
        .body(body.to_string())
        .unwrap()
}

/// Logs in and returns the `name=value` pair of the session cookie.
async fn login(app: &Router) -> String {
    let body = format!(
        r#"{{"userName":"{USERNAME}","password":"{PASSWORD}","createPersistentCookie":false}}"#
    );
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/Authentication_JSON_AppService.axd/Login", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}

// --- login ---

#[tokio::test]
async fn login_sets_session_cookie() {
    let app = app();
    let cookie = login(&app).await;
    assert!(cookie.starts_with(&format!("{AUTH_COOKIE}=")));
}

#[tokio::test]
async fn login_with_wrong_password_returns_json_error() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/Authentication_JSON_AppService.axd/Login",
            r#"{"userName":"admin","password":"nope","createPersistentCookie":false}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "InvalidCredentials");
}

// --- auth ---

#[tokio::test]
async fn odata_requires_session_cookie() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/OData/ServiceDesk/Ticket")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "Unauthorized");
}

#[tokio::test]
async fn unknown_session_token_is_rejected() {
    let resp = app()
        .oneshot(authed("GET", "/OData/ServiceDesk/Ticket", ".ASPXAUTH=forged", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- collection ---

#[tokio::test]
async fn list_tickets_returns_seeded_collection() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(authed("GET", "/OData/ServiceDesk/Ticket", &cookie, ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["odata.metadata"], "OData/$metadata#ServiceDesk/Ticket");
    assert_eq!(body["value"].as_array().unwrap().len(), 3);
    assert_eq!(body["value"][0]["odata.id"], "OData/ServiceDesk/Ticket(1)");
}

#[tokio::test]
async fn list_tickets_applies_filter_order_and_paging() {
    let app = app();
    let cookie = login(&app).await;
    let uri = "/OData/ServiceDesk/Ticket?%24filter=Status%20eq%20'Open'&%24orderby=Id%20desc&%24top=1";
    let resp = app.oneshot(authed("GET", uri, &cookie, "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let value = body["value"].as_array().unwrap();
    assert_eq!(value.len(), 1);
    assert_eq!(value[0]["Id"], 3);
}

#[tokio::test]
async fn unsupported_filter_returns_400() {
    let app = app();
    let cookie = login(&app).await;
    let uri = "/OData/ServiceDesk/Ticket?%24filter=Id%20gt%201";
    let resp = app.oneshot(authed("GET", uri, &cookie, "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- entity ---

#[tokio::test]
async fn get_ticket_by_numeric_and_string_key() {
    let app = app();
    let cookie = login(&app).await;

    let resp = app
        .clone()
        .oneshot(authed("GET", "/OData/ServiceDesk/Ticket(2)", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let by_id = body_json(resp).await;
    assert_eq!(by_id["Title"], "Broken window");

    let resp = app
        .oneshot(authed("GET", "/OData/ServiceDesk/Ticket('T-2')", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let by_code = body_json(resp).await;
    assert_eq!(by_code, by_id);
}

#[tokio::test]
async fn get_ticket_not_found() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(authed("GET", "/OData/ServiceDesk/Ticket(99)", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "NotFound");
}

#[tokio::test]
async fn unknown_entity_set_not_found() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(authed("GET", "/OData/ServiceDesk/Unicorn", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- create / update / delete ---

#[tokio::test]
async fn create_ticket_returns_201() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(authed("POST", "/OData/ServiceDesk/Ticket", &cookie, r#"{"Title":"Door stuck"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let ticket: Ticket = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(ticket.id, 4);
    assert_eq!(ticket.code, "T-4");
    assert_eq!(ticket.status, "Open");
}

#[tokio::test]
async fn patch_then_delete_ticket() {
    let app = app();
    let cookie = login(&app).await;

    let resp = app
        .clone()
        .oneshot(authed("PATCH", "/OData/ServiceDesk/Ticket(1)", &cookie, r#"{"Status":"Closed"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = app
        .clone()
        .oneshot(authed("GET", "/OData/ServiceDesk/Ticket(1)", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["Status"], "Closed");

    let resp = app
        .clone()
        .oneshot(authed("DELETE", "/OData/ServiceDesk/Ticket(1)", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(authed("DELETE", "/OData/ServiceDesk/Ticket(1)", &cookie, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- diagnostics ---

#[tokio::test]
async fn echo_reflects_request() {
    let resp = app()
        .oneshot(json_request("PUT", "/api/echo?a=1&b=x%20y", r#"{"k":true}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["method"], "PUT");
    assert_eq!(body["query"], "a=1&b=x%20y");
    assert_eq!(body["contentType"], "application/json");
    assert_eq!(body["body"], r#"{"k":true}"#);
}

#[tokio::test]
async fn broken_returns_plain_text_500() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/broken").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(body_bytes(resp).await, "upstream exploded");
}
