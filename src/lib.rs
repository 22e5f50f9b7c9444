pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::{create_api_router, expose_error_details};
use auth::CookiePolicy;
use axum::{Router, middleware};
use db::Database;
use jwt::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, JwtConfig};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    /// Access token and access cookie lifetime
    pub access_ttl: Duration,
    /// Refresh token and refresh cookie lifetime
    pub refresh_ttl: Duration,
    /// Production mode: `Secure; SameSite=None` cookies
    pub production: bool,
    /// Include the server-side cause in 5xx response bodies
    pub expose_error_details: bool,
    /// Attempts per minute per IP on `/register` and `/login`, unlimited when None
    pub auth_rate_limit: Option<NonZeroU32>,
    /// Take the client IP from `X-Forwarded-For` (requires running behind a proxy)
    pub trust_proxy: bool,
}

impl ServerConfig {
    /// Development configuration with default lifetimes and no rate limit.
    pub fn new(db: Database, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            production: false,
            expose_error_details: false,
            auth_rate_limit: None,
            trust_proxy: false,
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret, config.access_ttl));
    let cookies = CookiePolicy::new(config.production);
    let rate_limit = config
        .auth_rate_limit
        .map(|per_minute| Arc::new(RateLimitConfig::new(per_minute, config.trust_proxy)));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        cookies,
        config.refresh_ttl,
        rate_limit,
    );
    let api_router = if config.expose_error_details {
        api_router.layer(middleware::from_fn(expose_error_details))
    } else {
        api_router
    };

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
