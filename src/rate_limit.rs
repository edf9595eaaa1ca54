//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down credential
//! guessing and signup spam.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SECOND: NonZeroU32 = NonZeroU32::new(10).unwrap();
const SIGNUP_PER_MINUTE: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Bucket shared by requests that carry no peer address.
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (default: 10 requests per second)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for signup (default: 3 requests per minute)
    pub signup: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with the default production limits.
    pub fn new() -> Self {
        Self::with_limits(LOGIN_PER_SECOND, SIGNUP_PER_MINUTE)
    }

    /// Create rate limiters with custom limits.
    pub fn with_limits(login_per_second: NonZeroU32, signup_per_minute: NonZeroU32) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_second(login_per_second))),
            signup: Arc::new(RateLimiter::keyed(Quota::per_minute(signup_per_minute))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Key requests by peer IP. Falls back to a shared bucket when the server was
/// not started with connect info (e.g. when driving the router directly).
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_key(&request);

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}

/// Middleware for rate limiting signup.
pub async fn rate_limit_signup(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_key(&request);

    match config.signup.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Signup rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many signup attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
