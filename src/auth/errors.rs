//! Session authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::jwt::JwtError;

/// Why a presented session token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Signature and structure are fine but the token is past its expiry
    Expired,
    /// Signed with a different key
    InvalidSignature,
    /// Not a decodable session token
    Malformed,
}

impl From<&JwtError> for TokenRejection {
    fn from(err: &JwtError) -> Self {
        match err {
            JwtError::Expired => TokenRejection::Expired,
            JwtError::InvalidSignature => TokenRejection::InvalidSignature,
            _ => TokenRejection::Malformed,
        }
    }
}

/// Errors produced by the session authenticator.
#[derive(Debug)]
pub enum SessionError {
    /// No bearer credential supplied
    Unauthenticated,
    /// The token failed verification and no valid refresh path exists
    Forbidden(TokenRejection),
    /// The user store failed; carries the underlying error text
    Store(String),
    /// A replacement token could not be signed
    Signing(String),
}

impl SessionError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "Session store error");
        Self::Store(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SessionError::Forbidden(_) => StatusCode::FORBIDDEN,
            SessionError::Store(_) | SessionError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> &'static str {
        match self {
            SessionError::Unauthenticated => "Request without authorization header",
            SessionError::Forbidden(TokenRejection::Expired) => "Token expired",
            SessionError::Forbidden(TokenRejection::InvalidSignature) => "Invalid token signature",
            SessionError::Forbidden(TokenRejection::Malformed) => "Malformed token",
            SessionError::Store(_) => "Database error",
            SessionError::Signing(_) => "Failed to issue session token",
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Store(detail) | SessionError::Signing(detail) => {
                write!(f, "{}: {}", self.message(), detail)
            }
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for SessionError {}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            detail: Option<String>,
        }

        let detail = match &self {
            SessionError::Store(detail) | SessionError::Signing(detail) => Some(detail.clone()),
            _ => None,
        };

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
                detail,
            }),
        )
            .into_response()
    }
}
