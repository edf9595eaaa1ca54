#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use bazaar::{
    ServerConfig, create_app,
    db::Database,
    jwt::{JwtConfig, SessionClaims},
    rate_limit::RateLimitConfig,
};
use serde_json::{Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough!";
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Build the app on an in-memory database with relaxed rate limits.
pub async fn create_test_app() -> (Router, Database) {
    let limits = NonZeroU32::new(10_000).unwrap();
    create_test_app_with_limits(RateLimitConfig::with_limits(limits, limits)).await
}

pub async fn create_test_app_with_limits(rate_limit: RateLimitConfig) -> (Router, Database) {
    let (config, db) = create_test_config(rate_limit).await;
    (create_app(&config), db)
}

pub async fn create_test_config(rate_limit: RateLimitConfig) -> (ServerConfig, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        rate_limit: Arc::new(rate_limit),
    };
    (config, db)
}

pub fn jwt() -> JwtConfig {
    JwtConfig::new(TEST_SECRET)
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Sign arbitrary claims with the test secret, e.g. to forge an expired token.
pub fn sign_claims(claims: &SessionClaims) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

/// Re-sign the claims of `token` so that it expired an hour ago.
pub fn expire(token: &str) -> String {
    let mut claims = jwt().verify_session_token(token).unwrap();
    claims.iat = now_secs() - 7200;
    claims.exp = now_secs() - 3600;
    sign_claims(&claims)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Sign up a user through the API and return the created profile.
pub async fn signup(app: &Router, nick_name: &str) -> Value {
    let response = send(
        app,
        post_json(
            "/user/signup",
            json!({
                "fullName": format!("{} Example", nick_name),
                "nickName": nick_name,
                "email": format!("{}@example.com", nick_name),
                "location": "Berlin",
                "password": TEST_PASSWORD,
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Log in and return the session token.
pub async fn login(app: &Router, nick_name: &str, remember: bool) -> String {
    let response = send(
        app,
        post_json(
            "/user/login",
            json!({
                "email": format!("{}@example.com", nick_name),
                "password": TEST_PASSWORD,
                "remember": remember,
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string()
}
