//! Account and session endpoints.
//!
//! - POST `/signup` - Create an account
//! - POST `/login` - Exchange email and password for a session token
//! - POST `/logout` - Drop the durable refresh credential
//! - POST `/token` - Exchange a (possibly expired) session token for a new one
//! - GET `/` - Profile of the authenticated user
//! - POST `/update_info` - Update profile fields
//! - POST `/password` - Change password
//! - GET `/{nick_name}` - Public profile

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt, validate_length};
use crate::auth::{SessionAuth, SessionAuthenticator};
use crate::db::{Database, NewUser, ProfileUpdate, User};
use crate::impl_has_auth_backend;
use crate::jwt::generate_refresh_credential;
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Static route segments under `/user` that would shadow a public profile.
const RESERVED_NICK_NAMES: &[&str] = &[
    "login",
    "signup",
    "logout",
    "token",
    "update_info",
    "password",
];

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub auth: SessionAuthenticator<Database>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let signup_router = Router::new()
        .route("/signup", post(signup))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_signup,
        ));

    Router::new()
        .route("/", get(me))
        .route("/logout", post(logout))
        .route("/token", post(exchange_token))
        .route("/update_info", post(update_info))
        .route("/password", post(change_password))
        .route("/{nick_name}", get(public_profile))
        .with_state(state)
        .merge(login_router)
        .merge(signup_router)
}

// --- Request/Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    full_name: String,
    nick_name: String,
    email: String,
    location: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
    #[serde(default)]
    remember: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct LogoutRequest {
    email: String,
}

#[derive(Deserialize)]
struct TokenRequest {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    new_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInfoRequest {
    full_name: Option<String>,
    nick_name: Option<String>,
    location: Option<String>,
    avatar: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    #[serde(rename = "_id")]
    id: String,
    full_name: String,
    nick_name: String,
    /// Only included for the owner's own profile
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    location: String,
    avatar: Option<String>,
    last_login: Option<String>,
    created_at: String,
}

impl ProfileResponse {
    fn private(user: User) -> Self {
        let email = Some(user.email.clone());
        Self {
            email,
            ..Self::public(user)
        }
    }

    fn public(user: User) -> Self {
        Self {
            id: user.uuid,
            full_name: user.full_name,
            nick_name: user.nick_name,
            email: None,
            location: user.location,
            avatar: user.avatar,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

// --- Validation ---

fn validate_nick_name(nick_name: &str) -> Result<(), ApiError> {
    if nick_name.is_empty() {
        return Err(ApiError::bad_request("Nickname cannot be empty"));
    }

    if nick_name.chars().count() > 32 {
        return Err(ApiError::bad_request(
            "Nickname cannot be longer than 32 characters",
        ));
    }

    if !nick_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ApiError::bad_request(
            "Nickname can only contain letters, numbers, dots, and underscores",
        ));
    }

    if RESERVED_NICK_NAMES
        .iter()
        .any(|reserved| nick_name.eq_ignore_ascii_case(reserved))
    {
        return Err(ApiError::bad_request("Nickname is reserved"));
    }

    Ok(())
}

/// Map a unique-constraint violation on `users` to the matching 400.
///
/// The availability checks run before the write, so a concurrent duplicate
/// only surfaces here.
fn taken_or_db_err(context: &str, err: sqlx::Error) -> ApiError {
    let taken = match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            if db_err.message().contains("users.email") {
                Some("Provided email is taken")
            } else if db_err.message().contains("users.nick_name") {
                Some("Provided nickName is taken")
            } else {
                None
            }
        }
        _ => None,
    };

    match taken {
        Some(msg) => ApiError::bad_request(msg),
        None => ApiError::db_error(context, err),
    }
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    validate_length("Email", email, 3, 254)?;

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::bad_request("Invalid email address")),
    }
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    validate_length(
        "Password",
        password,
        MIN_PASSWORD_LENGTH,
        MAX_PASSWORD_LENGTH,
    )
}

// --- Handlers ---

async fn signup(
    State(state): State<UsersState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = payload.full_name.trim();
    let nick_name = payload.nick_name.trim();
    let email = payload.email.trim();
    let location = payload.location.trim();

    validate_length("Full name", full_name, 1, 64)?;
    validate_nick_name(nick_name)?;
    validate_email(email)?;
    validate_length("Location", location, 1, 64)?;
    validate_password(&payload.password)?;

    let users = state.db.users();

    if !users
        .is_nick_name_available(nick_name)
        .await
        .db_err("Failed to check nickname availability")?
    {
        return Err(ApiError::bad_request("Provided nickName is taken"));
    }

    if !users
        .is_email_available(email)
        .await
        .db_err("Failed to check email availability")?
    {
        return Err(ApiError::bad_request("Provided email is taken"));
    }

    let password_hash = hash_password(&payload.password).internal_err("Failed to hash password")?;

    let user = users
        .create(&NewUser {
            full_name: full_name.to_string(),
            nick_name: nick_name.to_string(),
            email: email.to_string(),
            location: location.to_string(),
            password_hash,
        })
        .await
        .map_err(|e| taken_or_db_err("Failed to create user", e))?;

    info!(user = %user.uuid, nick_name = %user.nick_name, "User signed up");

    Ok((StatusCode::CREATED, Json(ProfileResponse::private(user))))
}

async fn login(
    State(state): State<UsersState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users();

    let user = users
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User with that email does not exist"))?;

    let password_matches = verify_password(&payload.password, &user.password_hash)
        .internal_err("Failed to verify password")?;
    if !password_matches {
        return Err(ApiError::not_found("Wrong credentials"));
    }

    // A non-persistent login drops any credential from an earlier persistent one.
    let refresh_token = payload.remember.then(generate_refresh_credential);
    users
        .set_refresh_token(&user.email, refresh_token.as_deref())
        .await
        .db_err("Failed to store refresh token")?;

    let issued = state
        .auth
        .jwt()
        .issue_session_token(&user.identity(), refresh_token.as_deref())
        .internal_err("Failed to issue session token")?;

    users
        .touch_last_login(&user.email)
        .await
        .db_err("Failed to update last login")?;

    info!(user = %user.uuid, remember = payload.remember, "User logged in");

    Ok(Json(LoginResponse {
        access_token: issued.token,
    }))
}

async fn logout(
    State(state): State<UsersState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .set_refresh_token(payload.email.trim(), None)
        .await
        .db_err("Failed to clear refresh token")?;

    Ok(Json(MessageResponse {
        message: "Refresh token deleted",
    }))
}

/// Issue a new session token if the client's refresh credential matches the
/// one on file. A mismatch invalidates the stored credential.
async fn exchange_token(
    State(state): State<UsersState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = state
        .auth
        .jwt()
        .decode_unverified(&payload.token)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    let users = state.db.users();
    let user = users
        .get_by_email(presented.email())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    match (user.refresh_token.as_deref(), presented.refresh_token()) {
        (Some(on_file), Some(client)) if on_file == client => {
            let issued = state
                .auth
                .jwt()
                .issue_session_token(&user.identity(), Some(on_file))
                .internal_err("Failed to issue session token")?;

            Ok(Json(TokenResponse {
                new_token: issued.token,
            }))
        }
        _ => {
            warn!(user = %user.uuid, "Refresh credential mismatch, logging out");
            users
                .set_refresh_token(&user.email, None)
                .await
                .db_err("Failed to clear refresh token")?;
            Err(ApiError::unauthorized("It is not your token, logout"))
        }
    }
}

async fn me(
    State(state): State<UsersState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_email(session.email())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileResponse::private(user)))
}

async fn update_info(
    State(state): State<UsersState>,
    SessionAuth(session): SessionAuth,
    Json(payload): Json<UpdateInfoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users();
    let user = users
        .get_by_email(session.email())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let full_name = payload.full_name.map(|s| s.trim().to_string());
    let nick_name = payload.nick_name.map(|s| s.trim().to_string());
    let location = payload.location.map(|s| s.trim().to_string());
    let avatar = payload.avatar.map(|s| s.trim().to_string());

    if let Some(ref full_name) = full_name {
        validate_length("Full name", full_name, 1, 64)?;
    }
    if let Some(ref location) = location {
        validate_length("Location", location, 1, 64)?;
    }
    if let Some(ref avatar) = avatar {
        validate_length("Avatar", avatar, 1, 512)?;
    }
    if let Some(ref nick_name) = nick_name {
        validate_nick_name(nick_name)?;

        let changed = !nick_name.eq_ignore_ascii_case(&user.nick_name);
        if changed
            && !users
                .is_nick_name_available(nick_name)
                .await
                .db_err("Failed to check nickname availability")?
        {
            return Err(ApiError::bad_request("Provided nickName is taken"));
        }
    }

    let update = ProfileUpdate {
        full_name,
        nick_name,
        location,
        avatar,
    };
    users
        .update_profile(user.id, &update)
        .await
        .map_err(|e| taken_or_db_err("Failed to update user", e))?;

    let user = users
        .get_by_id(user.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileResponse::private(user)))
}

async fn change_password(
    State(state): State<UsersState>,
    SessionAuth(session): SessionAuth,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users();
    let user = users
        .get_by_email(session.email())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let old_matches = verify_password(&payload.old_password, &user.password_hash)
        .internal_err("Failed to verify password")?;
    if !old_matches {
        return Err(ApiError::forbidden("Old password does not match"));
    }

    validate_password(&payload.new_password)?;

    let password_hash =
        hash_password(&payload.new_password).internal_err("Failed to hash password")?;
    users
        .set_password_hash(user.id, &password_hash)
        .await
        .db_err("Failed to update password")?;

    info!(user = %user.uuid, "Password changed");

    #[derive(Serialize)]
    struct PasswordChangedResponse {
        password: &'static str,
    }

    Ok(Json(PasswordChangedResponse {
        password: "Password changed successfully",
    }))
}

async fn public_profile(
    State(state): State<UsersState>,
    Path(nick_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_nick_name(&nick_name)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileResponse::public(user)))
}
