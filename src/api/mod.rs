mod error;
mod products;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::SessionAuthenticator;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth = SessionAuthenticator::new(jwt, db.clone());

    let products_state = products::ProductsState {
        db: db.clone(),
        auth: auth.clone(),
    };

    let users_state = users::UsersState {
        db,
        auth,
        rate_limit_config,
    };

    Router::new()
        .nest("/user", users::router(users_state))
        .nest("/product", products::router(products_state))
}
