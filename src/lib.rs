pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use auth::expose_refreshed_token;
use axum::{Router, middleware};
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing session tokens
    pub jwt_secret: Vec<u8>,
    /// Login and signup rate limiters
    pub rate_limit: Arc<RateLimitConfig>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));

    create_api_router(config.db.clone(), jwt, config.rate_limit.clone())
        .layer(middleware::from_fn(expose_refreshed_token))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
