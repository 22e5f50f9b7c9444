mod auth;
mod error;
mod users;
mod validate;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CookiePolicy;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ErrorDetail, ResultExt, expose_error_details};
pub use users::{UpdateUserRequest, UserField, permitted_fields};

/// Create the API router (mounted at `/api`).
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    cookies: CookiePolicy,
    refresh_ttl: Duration,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        cookies,
        refresh_ttl,
    };

    let users_state = users::UsersState { db, jwt };

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(auth_state, rate_limit))
        .nest("/users", users::router(users_state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
