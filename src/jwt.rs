//! Session token generation and validation.

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Session token duration: 30 minutes.
pub const SESSION_TOKEN_DURATION_SECS: u64 = 30 * 60;

/// Number of random bytes in a durable refresh credential.
const REFRESH_CREDENTIAL_BYTES: usize = 32;

/// Identity claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub full_name: String,
    pub nick_name: String,
    pub email: String,
    /// Public user UUID
    #[serde(rename = "_id")]
    pub id: String,
}

/// Claims of a session token whose signature and expiry have been verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub identity: Identity,
    /// Client copy of the durable refresh credential (persistent logins only)
    #[serde(
        rename = "refreshToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims decoded from a token WITHOUT checking its signature.
///
/// Only the email (to find the user record) and the presented refresh
/// credential (to compare against the one on file) are readable. Everything
/// else an attacker could have written is dropped at deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct UnverifiedClaims {
    email: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

impl UnverifiedClaims {
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

/// A freshly signed session token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    /// The JWT token string
    pub token: String,
    /// Claims that were signed into the token
    pub claims: SessionClaims,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a session token for the given identity.
    /// The token is always valid for exactly `SESSION_TOKEN_DURATION_SECS`.
    pub fn issue_session_token(
        &self,
        identity: &Identity,
        refresh_token: Option<&str>,
    ) -> Result<SessionToken, JwtError> {
        let now = now_secs()?;

        let claims = SessionClaims {
            identity: identity.clone(),
            refresh_token: refresh_token.map(str::to_string),
            iat: now,
            exp: now + SESSION_TOKEN_DURATION_SECS,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(SessionToken { token, claims })
    }

    /// Verify the signature and structure of a session token, then check
    /// wall-clock expiry with zero leeway.
    pub fn verify_session_token(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below so it can be reported separately.
        validation.validate_exp = false;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
                .map_err(|e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                    _ => JwtError::Decoding(e),
                })?;

        if token_data.claims.exp <= now_secs()? {
            return Err(JwtError::Expired);
        }

        Ok(token_data.claims)
    }

    /// Decode the claims of a token without verifying its signature or expiry.
    pub fn decode_unverified(&self, token: &str) -> Result<UnverifiedClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let token_data = jsonwebtoken::decode::<UnverifiedClaims>(
            token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .map_err(JwtError::Decoding)?;

        Ok(token_data.claims)
    }
}

/// Generate a new opaque durable refresh credential.
pub fn generate_refresh_credential() -> String {
    let mut bytes = [0u8; REFRESH_CREDENTIAL_BYTES];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token is malformed or its claims do not deserialize
    Decoding(jsonwebtoken::errors::Error),
    /// Signature does not match
    InvalidSignature,
    /// Token is past its expiry instant
    Expired,
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::InvalidSignature => write!(f, "Invalid token signature"),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}
