//! Rate limiting for the credential endpoints.
//!
//! Uses a token bucket per client IP to slow down password guessing.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for `/register` and `/login`.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub auth: Arc<IpLimiter>,
    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Allow `per_minute` attempts per IP, all of which may be used as a burst.
    pub fn new(per_minute: NonZeroU32, trust_proxy: bool) -> Self {
        Self {
            auth: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            trust_proxy,
        }
    }
}

/// Middleware for rate limiting credential endpoints.
pub async fn rate_limit_auth(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.trust_proxy) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejected request without client IP");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Unable to determine client IP" })),
            )
                .into_response();
        }
    };

    match config.auth.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Auth rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many authentication attempts" })),
            )
                .into_response()
        }
    }
}
