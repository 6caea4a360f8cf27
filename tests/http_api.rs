//! HTTP API tests through the full router.

mod common;

use accountd::app::build_app;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use accountd::mail::MemoryMailer;
use common::{test_app, test_app_with, TestApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(v) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn signup(router: &Router, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        router,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": username, "email": email, "password": password })),
    )
    .await
}

async fn signin(router: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    call(
        router,
        Method::POST,
        "/api/v1/auth/signin",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

async fn confirmed_session(app: &TestApp, router: &Router, username: &str, email: &str) -> String {
    signup(router, username, email, "pw1").await;
    let token = app.mailed_token(email);
    let (status, _) = call(
        router,
        Method::GET,
        &format!("/api/v1/auth/confirm/{token}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = signin(router, username, "pw1").await;
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app();
    let router = build_app(app.state.clone());
    let req = Request::builder()
        .uri("/api/v1/health")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn signup_returns_created_and_mails_link() {
    let app = test_app();
    let router = build_app(app.state.clone());

    let (status, body) = signup(&router, "alice", "alice@x.com", "pw1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["is_confirmed"], false);
    assert_eq!(body["mail"], "sent");
    assert!(body["user"].get("password_hash").is_none());

    let mail = app.mailer.last_to("alice@x.com").unwrap();
    assert!(mail
        .body
        .contains("http://accounts.test/api/v1/auth/confirm/"));
}

#[tokio::test]
async fn signup_reports_mail_failure_with_warning() {
    let app = test_app_with(MemoryMailer::failing());
    let router = build_app(app.state.clone());

    let (status, body) = signup(&router, "alice", "alice@x.com", "pw1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "alice@x.com");
    assert_eq!(body["mail"], "failed");
    assert!(body["warning"]
        .as_str()
        .unwrap()
        .starts_with("Email could not be delivered"));
    assert_eq!(app.store.len().await, 1);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let app = test_app();
    let router = build_app(app.state.clone());
    signup(&router, "alice", "alice@x.com", "pw1").await;

    let (status, body) = signup(&router, "alice2", "alice@x.com", "pw2").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate_email");
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let app = test_app();
    let router = build_app(app.state.clone());
    let (status, body) = signup(&router, "alice", "nope", "pw1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn confirm_link_twice_reports_already_confirmed() {
    let app = test_app();
    let router = build_app(app.state.clone());
    signup(&router, "alice", "alice@x.com", "pw1").await;
    let uri = format!("/api/v1/auth/confirm/{}", app.mailed_token("alice@x.com"));

    let (_, first) = call(&router, Method::GET, &uri, None, None).await;
    assert_eq!(first["status"], "confirmed");
    let (status, second) = call(&router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "already_confirmed");
}

#[tokio::test]
async fn bad_link_gets_one_generic_message() {
    let app = test_app();
    let router = build_app(app.state.clone());
    let (status, body) = call(
        &router,
        Method::GET,
        "/api/v1/auth/confirm/not-a-token",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "expired_or_invalid_link");
}

#[tokio::test]
async fn signin_failures_look_the_same() {
    let app = test_app();
    let router = build_app(app.state.clone());
    confirmed_session(&app, &router, "alice", "alice@x.com").await;

    let (s1, b1) = signin(&router, "nobody", "pw1").await;
    let (s2, b2) = signin(&router, "alice", "wrong").await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s1, s2);
    assert_eq!(b1, b2);
}

#[tokio::test]
async fn unconfirmed_signin_is_forbidden() {
    let app = test_app();
    let router = build_app(app.state.clone());
    signup(&router, "bob", "bob@x.com", "pw1").await;

    let (status, body) = signin(&router, "bob", "pw1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "not_confirmed");
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn me_requires_session() {
    let app = test_app();
    let router = build_app(app.state.clone());

    let (status, _) = call(&router, Method::GET, "/api/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&router, Method::GET, "/api/v1/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = confirmed_session(&app, &router, "alice", "alice@x.com").await;
    let (status, body) = call(&router, Method::GET, "/api/v1/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@x.com");
    assert_eq!(body["is_confirmed"], true);
}

#[tokio::test]
async fn reset_flow_over_http() {
    let app = test_app();
    let router = build_app(app.state.clone());
    confirmed_session(&app, &router, "alice", "alice@x.com").await;

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/auth/reset-password",
        None,
        Some(json!({ "email": "ghost@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/auth/reset-password",
        None,
        Some(json!({ "email": "alice@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mail"], "sent");

    let uri = format!("/api/v1/auth/reset-password/{}", app.mailed_token("alice@x.com"));
    let (status, _) = call(
        &router,
        Method::POST,
        &uri,
        None,
        Some(json!({ "new_password": "pw2", "confirm_password": "mismatch" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &router,
        Method::POST,
        &uri,
        None,
        Some(json!({ "new_password": "pw2", "confirm_password": "pw2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(signin(&router, "alice", "pw1").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(signin(&router, "alice", "pw2").await.0, StatusCode::OK);
}

#[tokio::test]
async fn change_password_and_delete_account() {
    let app = test_app();
    let router = build_app(app.state.clone());
    let token = confirmed_session(&app, &router, "alice", "alice@x.com").await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/auth/change-password",
        Some(&token),
        Some(json!({ "old_password": "bad", "new_password": "pw2", "confirm_password": "pw2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "incorrect_password");

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/auth/change-password",
        Some(&token),
        Some(json!({ "old_password": "pw1", "new_password": "pw2", "confirm_password": "pw2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&router, Method::DELETE, "/api/v1/auth/account", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.is_empty().await);

    let (status, _) = call(&router, Method::GET, "/api/v1/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_requires_session() {
    let app = test_app();
    let router = build_app(app.state.clone());
    let (status, _) = call(&router, Method::POST, "/api/v1/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = confirmed_session(&app, &router, "alice", "alice@x.com").await;
    let (status, _) = call(&router, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
