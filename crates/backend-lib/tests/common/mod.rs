//! Shared setup for the HTTP-level tests.
//!
//! Builds an [`AppState`] over an in-memory directory seeded with an admin
//! (id 1) and two plain users (ids 5 and 7), hashed at the lowest cost so the
//! suite stays fast.

#![allow(dead_code)]

use apishield_backend_lib::{
    auth::{Credential, CredentialHasher},
    config::Settings,
    directory::{MemoryDirectory, UserRecord},
    router::create_router,
    AppState,
};
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-integration-secret";
pub const COOKIE: &str = "auth_token";

pub const ADMIN: (&str, &str) = ("admin", "admin-pw");
pub const ALICE: (&str, &str) = ("alice", "alice-pw");
pub const BOB: (&str, &str) = ("bob", "bob-pw");

pub fn test_settings() -> Settings {
    let mut settings = Settings::new(SECRET, COOKIE);
    settings.hash_cost = 4;
    settings
}

async fn record(
    hasher: &CredentialHasher,
    id: i64,
    (username, password): (&str, &str),
    is_admin: bool,
) -> UserRecord {
    UserRecord {
        id,
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        password_hash: Some(
            hasher
                .hash(Credential::from(password.to_string()))
                .await
                .unwrap(),
        ),
        is_admin,
    }
}

/// State over a seeded in-memory directory
pub async fn seeded_state(settings: Settings) -> Arc<AppState> {
    let hasher = CredentialHasher::new(settings.hash_cost).unwrap();
    let records = vec![
        record(&hasher, 1, ADMIN, true).await,
        record(&hasher, 5, ALICE, false).await,
        record(&hasher, 7, BOB, false).await,
    ];
    let directory = Arc::new(MemoryDirectory::from_records(records));
    Arc::new(AppState::new(directory, settings).unwrap())
}

pub async fn seeded_app() -> Router {
    create_router(seeded_state(test_settings()).await)
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// All `Set-Cookie` values of a response
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` value for `name`
pub fn set_cookie<'a>(cookies: &'a [String], name: &str) -> &'a str {
    let prefix = format!("{name}=");
    cookies
        .iter()
        .find(|c| c.starts_with(&prefix))
        .unwrap_or_else(|| panic!("no {name} cookie in {cookies:?}"))
}

/// Log in and return a `Cookie` header value carrying the session token
pub async fn login(app: &Router, (username, password): (&str, &str)) -> String {
    let body = serde_json::json!({ "username": username, "password": password }).to_string();
    let response = send(app, request("POST", "/login", None, Some(&body))).await;
    assert_eq!(response.status(), StatusCode::OK, "login as {username}");

    let cookies = set_cookies(&response);
    set_cookie(&cookies, COOKIE)
        .split(';')
        .next()
        .unwrap()
        .to_string()
}
