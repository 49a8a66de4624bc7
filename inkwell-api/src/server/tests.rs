use crate::server::{ServerState, Settings, routes, templates};
use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use http_body_util::BodyExt;
use inkwell_common::{
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use inkwell_db::client::DbClient;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

/// Every request here has to be answered before the pool is first used.
fn app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://inkwell@127.0.0.1:1/inkwell")
        .unwrap();
    let state = ServerState {
        db_client: Arc::new(DbClient::new(pool, WorkerId::default(), ProcessId::default())),
        templates: Arc::new(templates::load().unwrap()),
        settings: Arc::new(Settings {
            token_lifetime: PositiveDuration::from_seconds(3600).unwrap(),
            secure_cookies: false,
        }),
    };
    routes().with_state(state)
}

async fn send(request: Request<Body>) -> Response {
    app().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let response = send(Request::get("/api/nothing-here").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["status"], 404);
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn missing_token_is_401() {
    let response = send(Request::get("/api/auth/me").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_token_is_400() {
    let request = Request::get("/api/auth/me")
        .header(AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_bearer_authorization_is_400() {
    let request = Request::get("/api/auth/me")
        .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], 400);
}

#[tokio::test]
async fn optional_auth_still_rejects_a_bad_token() {
    let request = Request::get("/api/posts")
        .header(AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(request).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_writes_require_a_token() {
    let response = send(post_json("/api/posts", r#"{"title": "Hi", "content": "There"}"#)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::delete("/api/comments/42").body(Body::empty()).unwrap();
    assert_eq!(send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_reports_field_errors() {
    let response = send(post_json(
        "/api/auth/register",
        r#"{"username": "no spaces allowed", "email": "nope", "password": "12345678", "password2": "12345679"}"#,
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let errors = &body["errors"];
    assert!(errors["username"].is_array());
    assert!(errors["email"].is_array());
    assert!(errors["password"].is_array());
    assert!(errors["password2"].is_array());
}

#[tokio::test]
async fn broken_json_is_400() {
    let response = send(post_json("/api/auth/register", "{\"username\": ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_sort_is_400() {
    let response = send(Request::get("/api/posts?sort=random").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(Request::get("/api/posts?page=two").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_page_renders() {
    let response = send(Request::get("/accounts/login").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("<form method=\"post\" action=\"/accounts/login\">"));
    assert!(html.contains("Register"));
}

#[tokio::test]
async fn empty_login_redirects_with_a_flash() {
    let request = Request::post("/accounts/login")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=&password="))
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/accounts/login");
    assert!(set_cookies(&response).iter().any(|cookie| cookie.starts_with("flash=")));
}

#[tokio::test]
async fn flash_is_shown_once() {
    let request = Request::post("/accounts/login")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=someone&password="))
        .unwrap();
    let response = send(request).await;
    let flash = set_cookies(&response)
        .into_iter()
        .find(|cookie| cookie.starts_with("flash="))
        .unwrap();
    let flash = flash.split(';').next().unwrap().to_owned();

    let request = Request::get("/accounts/login")
        .header(COOKIE, flash)
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).iter().any(|cookie| cookie.starts_with("flash=;")));

    let html = body_text(response).await;
    assert!(html.contains("Please enter both a username and a password."));
}

#[tokio::test]
async fn anonymous_notifications_redirect_to_login() {
    let response = send(Request::get("/accounts/notifications").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/accounts/login");
}

#[tokio::test]
async fn anonymous_comments_redirect_to_login() {
    let request = Request::post("/blog/some-post/comment")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("content=Hello"))
        .unwrap();
    let response = send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/accounts/login");
}

#[tokio::test]
async fn anonymous_authoring_redirects_to_login() {
    let response = send(Request::get("/blog/create/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/accounts/login");

    let response = send(Request::get("/blog/category/create/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/accounts/login");
}

#[tokio::test]
async fn anonymous_toggles_redirect_to_login() {
    for uri in [
        "/blog/some-post/like",
        "/blog/some-post/dislike",
        "/blog/some-post/bookmark",
        "/blog/comment/42/like",
        "/accounts/profile/someone/follow",
        "/accounts/notifications/42/read",
        "/accounts/notifications/42/delete",
    ] {
        let response = send(Request::post(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(response.headers()[LOCATION], "/accounts/login", "{uri}");
    }
}
