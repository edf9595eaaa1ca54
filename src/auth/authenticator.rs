//! Bearer token validation with silent refresh.

use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderMap;

use super::bearer::bearer_token;
use super::errors::{SessionError, TokenRejection};
use super::types::{Session, SessionUser};
use crate::db::{Database, User};
use crate::jwt::JwtConfig;

/// User-record operations the authenticator needs, keyed by email.
pub trait SessionStore: Send + Sync {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, sqlx::Error>> + Send;

    fn touch_last_login(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl SessionStore for Database {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.users().get_by_email(email).await
    }

    async fn touch_last_login(&self, email: &str) -> Result<(), sqlx::Error> {
        self.users().touch_last_login(email).await.map(|_| ())
    }
}

/// Validates bearer credentials and re-issues expired ones when the user
/// holds a matching durable refresh credential.
#[derive(Clone)]
pub struct SessionAuthenticator<S> {
    jwt: Arc<JwtConfig>,
    store: S,
}

impl<S: SessionStore> SessionAuthenticator<S> {
    pub fn new(jwt: Arc<JwtConfig>, store: S) -> Self {
        Self { jwt, store }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Authenticate a request from its headers.
    ///
    /// Performs at most one last-login update and at most one token mint.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let token = bearer_token(headers).ok_or(SessionError::Unauthenticated)?;

        match self.jwt.verify_session_token(token) {
            Ok(claims) => {
                self.store
                    .touch_last_login(&claims.identity.email)
                    .await
                    .map_err(SessionError::store)?;

                Ok(Session {
                    user: SessionUser { claims },
                    refreshed: None,
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected, attempting refresh");
                self.refresh(token, TokenRejection::from(&e)).await
            }
        }
    }

    /// Mint a replacement token from the durable refresh credential on file.
    async fn refresh(&self, token: &str, cause: TokenRejection) -> Result<Session, SessionError> {
        let presented = self
            .jwt
            .decode_unverified(token)
            .map_err(|_| SessionError::Forbidden(cause))?;

        let user = self
            .store
            .find_by_email(presented.email())
            .await
            .map_err(SessionError::store)?
            .ok_or(SessionError::Forbidden(cause))?;

        let on_file = user
            .refresh_token
            .as_deref()
            .ok_or(SessionError::Forbidden(cause))?;

        if presented.refresh_token() != Some(on_file) {
            tracing::warn!(
                email = %presented.email(),
                "Presented refresh credential does not match"
            );
            return Err(SessionError::Forbidden(cause));
        }

        // Identity comes from the user record, never from the unverified token.
        let minted = self
            .jwt
            .issue_session_token(&user.identity(), Some(on_file))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to issue session token");
                SessionError::Signing(e.to_string())
            })?;

        self.store
            .touch_last_login(presented.email())
            .await
            .map_err(SessionError::store)?;

        tracing::info!(user = %user.uuid, "Session token refreshed");

        Ok(Session {
            user: SessionUser {
                claims: minted.claims,
            },
            refreshed: Some(minted.token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{SESSION_TOKEN_DURATION_SECS, SessionClaims};
    use axum::http::{HeaderValue, header};
    use jsonwebtoken::{EncodingKey, Header};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &[u8] = b"test-secret-key-for-testing";

    #[derive(Clone, Default)]
    struct MockStore {
        users: Arc<Mutex<HashMap<String, User>>>,
        touches: Arc<Mutex<Vec<String>>>,
        lookups: Arc<Mutex<Vec<String>>>,
        broken: bool,
    }

    impl MockStore {
        fn with_user(refresh_token: Option<&str>) -> Self {
            let store = MockStore::default();
            store.users.lock().unwrap().insert(
                "alice@example.com".to_string(),
                User {
                    id: 1,
                    uuid: "uuid-alice".to_string(),
                    full_name: "Alice Liddell".to_string(),
                    nick_name: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    location: "Oxford".to_string(),
                    password_hash: "hash".to_string(),
                    refresh_token: refresh_token.map(str::to_string),
                    avatar: None,
                    last_login: None,
                    created_at: "2024-01-01 00:00:00".to_string(),
                },
            );
            store
        }

        fn touches(&self) -> Vec<String> {
            self.touches.lock().unwrap().clone()
        }
    }

    impl SessionStore for MockStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
            if self.broken {
                return Err(sqlx::Error::PoolClosed);
            }
            self.lookups.lock().unwrap().push(email.to_string());
            Ok(self.users.lock().unwrap().get(email).cloned())
        }

        async fn touch_last_login(&self, email: &str) -> Result<(), sqlx::Error> {
            if self.broken {
                return Err(sqlx::Error::PoolClosed);
            }
            self.touches.lock().unwrap().push(email.to_string());
            Ok(())
        }
    }

    fn authenticator(store: MockStore) -> SessionAuthenticator<MockStore> {
        SessionAuthenticator::new(Arc::new(JwtConfig::new(SECRET)), store)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    /// Sign claims for alice with an arbitrary validity window.
    fn alice_token(secret: &[u8], refresh_token: Option<&str>, iat: u64, exp: u64) -> String {
        let claims = SessionClaims {
            identity: crate::jwt::Identity {
                full_name: "Alice Liddell".to_string(),
                nick_name: "alice".to_string(),
                email: "alice@example.com".to_string(),
                id: "uuid-alice".to_string(),
            },
            refresh_token: refresh_token.map(str::to_string),
            iat,
            exp,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    fn expired_alice_token(refresh_token: Option<&str>) -> String {
        let now = now();
        alice_token(SECRET, refresh_token, now - 3600, now - 60)
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let store = MockStore::with_user(Some("durable"));
        let auth = authenticator(store.clone());

        let result = auth.authenticate(&HeaderMap::new()).await;
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
        assert!(store.touches().is_empty());
    }

    #[tokio::test]
    async fn test_valid_token_proceeds_and_touches_once() {
        let store = MockStore::with_user(None);
        let auth = authenticator(store.clone());
        let now = now();
        let token = alice_token(SECRET, None, now, now + 600);

        let session = auth.authenticate(&bearer(&token)).await.unwrap();

        assert!(session.refreshed.is_none());
        assert_eq!(session.user.email(), "alice@example.com");
        assert_eq!(store.touches(), vec!["alice@example.com".to_string()]);
        // The fast path never consults the refresh credential
        assert!(store.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_with_matching_credential_is_refreshed() {
        let store = MockStore::with_user(Some("durable"));
        let auth = authenticator(store.clone());
        let token = expired_alice_token(Some("durable"));

        let session = auth.authenticate(&bearer(&token)).await.unwrap();

        let refreshed = session.refreshed.expect("token should be refreshed");
        let claims = auth.jwt().verify_session_token(&refreshed).unwrap();
        assert!(claims.exp > now());
        assert_eq!(claims.identity.id, "uuid-alice");
        assert_eq!(claims.refresh_token.as_deref(), Some("durable"));
        assert_eq!(session.user.user_uuid(), "uuid-alice");
        assert_eq!(store.touches(), vec!["alice@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_token_without_credential_is_forbidden() {
        let store = MockStore::with_user(None);
        let auth = authenticator(store.clone());
        let token = expired_alice_token(Some("durable"));

        let result = auth.authenticate(&bearer(&token)).await;

        assert!(matches!(
            result,
            Err(SessionError::Forbidden(TokenRejection::Expired))
        ));
        assert!(store.touches().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_credential_is_forbidden() {
        let store = MockStore::with_user(Some("durable"));
        let auth = authenticator(store.clone());
        let token = expired_alice_token(Some("stolen-guess"));

        let result = auth.authenticate(&bearer(&token)).await;

        assert!(matches!(result, Err(SessionError::Forbidden(_))));
        assert!(store.touches().is_empty());
        // The credential on file is left alone
        let users = store.users.lock().unwrap();
        assert_eq!(
            users["alice@example.com"].refresh_token.as_deref(),
            Some("durable")
        );
    }

    #[tokio::test]
    async fn test_unknown_user_is_forbidden() {
        let store = MockStore::default();
        let auth = authenticator(store.clone());
        let token = expired_alice_token(Some("durable"));

        let result = auth.authenticate(&bearer(&token)).await;
        assert!(matches!(result, Err(SessionError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_bad_signature_takes_refresh_path() {
        let store = MockStore::with_user(Some("durable"));
        let auth = authenticator(store.clone());
        let now = now();
        let token = alice_token(b"forged-secret", Some("durable"), now, now + 600);

        let session = auth.authenticate(&bearer(&token)).await.unwrap();

        assert!(session.refreshed.is_some());
        assert_eq!(store.lookups.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_garbage_token_is_treated_like_expired() {
        let store = MockStore::with_user(None);
        let auth = authenticator(store.clone());

        let result = auth.authenticate(&bearer("garbage")).await;

        assert!(matches!(
            result,
            Err(SessionError::Forbidden(TokenRejection::Malformed))
        ));
        assert!(store.touches().is_empty());
    }

    #[tokio::test]
    async fn test_refreshed_token_has_fixed_window() {
        let store = MockStore::with_user(Some("durable"));
        let auth = authenticator(store);
        // Forged token claiming a validity of ten years
        let now = now();
        let token = alice_token(b"forged-secret", Some("durable"), now, now + 10 * 365 * 86400);

        let session = auth.authenticate(&bearer(&token)).await.unwrap();

        let claims = session.user.claims;
        assert_eq!(claims.exp - claims.iat, SESSION_TOKEN_DURATION_SECS);
        assert!(claims.exp <= now + SESSION_TOKEN_DURATION_SECS + 5);
    }

    #[tokio::test]
    async fn test_refresh_uses_identity_from_record() {
        let store = MockStore::with_user(Some("durable"));
        let auth = authenticator(store);
        let now = now();
        // Unverified token claims a different id and name for alice's email
        let claims = serde_json::json!({
            "fullName": "Mallory",
            "nickName": "mallory",
            "email": "alice@example.com",
            "_id": "uuid-mallory",
            "refreshToken": "durable",
            "iat": now - 100,
            "exp": now - 10,
        });
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"forged-secret"),
        )
        .unwrap();

        let session = auth.authenticate(&bearer(&token)).await.unwrap();
        assert_eq!(session.user.claims.identity.nick_name, "alice");
        assert_eq!(session.user.user_uuid(), "uuid-alice");
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let store = MockStore {
            broken: true,
            ..MockStore::with_user(None)
        };
        let auth = authenticator(store);
        let now = now();
        let token = alice_token(SECRET, None, now, now + 600);

        let result = auth.authenticate(&bearer(&token)).await;
        let err = result.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
