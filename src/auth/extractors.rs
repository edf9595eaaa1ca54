//! Axum extractor and response middleware for session authentication.

use std::cell::RefCell;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::bearer::bearer_header_value;
use super::errors::SessionError;
use super::state::HasAuthBackend;
use super::types::SessionUser;

/// Response header carrying a refreshed session token back to the client.
pub const REFRESHED_TOKEN_HEADER: &str = "x-access-token";

tokio::task_local! {
    /// Task-local storage for a refreshed session token.
    /// Used to pass the token from the auth extractor to the response middleware.
    pub static REFRESHED_SESSION_TOKEN: RefCell<Option<String>>;
}

/// Extractor for endpoints that require a session.
///
/// When the presented token was refreshed, the request's `Authorization`
/// header is rewritten to the new token and the token is queued for the
/// response (see [`expose_refreshed_token`]). The user is also inserted into
/// the request extensions.
pub struct SessionAuth(pub SessionUser);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = state.authenticator().authenticate(&parts.headers).await?;

        if let Some(token) = session.refreshed {
            if let Some(value) = bearer_header_value(&token) {
                parts.headers.insert(header::AUTHORIZATION, value);
            }
            let _ = REFRESHED_SESSION_TOKEN.try_with(|cell| {
                cell.borrow_mut().replace(token);
            });
        }

        parts.extensions.insert(session.user.clone());
        Ok(SessionAuth(session.user))
    }
}

/// Middleware that copies a refreshed session token onto the response.
pub async fn expose_refreshed_token(request: Request, next: Next) -> Response {
    REFRESHED_SESSION_TOKEN
        .scope(RefCell::new(None), async move {
            let mut response = next.run(request).await;

            let refreshed = REFRESHED_SESSION_TOKEN.with(|cell| cell.borrow_mut().take());
            if let Some(token) = refreshed {
                if let Ok(value) = HeaderValue::from_str(&token) {
                    response.headers_mut().insert(REFRESHED_TOKEN_HEADER, value);
                }
            }

            response
        })
        .await
}
