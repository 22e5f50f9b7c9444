//! Credential and session endpoints: register, login, refresh, me, logout.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use super::validate::{validate_email, validate_name, validate_password};
use crate::auth::{AnyRole, Auth, AuthError, CookiePolicy, REFRESH_COOKIE_NAME, get_cookie};
use crate::db::{Database, NewUser, User, UserProfile, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, generate_refresh_token, unix_now};
use crate::password::{hash_password_blocking, verify_password_blocking};
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookiePolicy,
    pub refresh_ttl: Duration,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login));
    let credentials = match rate_limit {
        Some(config) => credentials.layer(middleware::from_fn_with_state(config, rate_limit_auth)),
        None => credentials,
    };

    Router::new()
        .merge(credentials)
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct UserResponse {
    user: UserProfile,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

type SetCookies = AppendHeaders<[(header::HeaderName, String); 2]>;

/// Issue an access token and a stored refresh token for a user.
async fn start_session(state: &AuthState, user: &User) -> Result<SetCookies, ApiError> {
    let access = state
        .jwt
        .issue_access_token(&user.id, &user.email, user.role)
        .db_err("Failed to issue access token")?;

    let refresh_token = generate_refresh_token();
    let refresh_ttl = state.refresh_ttl.as_secs();
    let expires_at = (unix_now() + refresh_ttl) as i64;
    state
        .db
        .sessions()
        .create(&refresh_token, &user.id, expires_at)
        .await
        .db_err("Failed to store refresh token")?;

    Ok(AppendHeaders([
        (
            header::SET_COOKIE,
            state.cookies.access_cookie(&access.token, access.expires_in),
        ),
        (
            header::SET_COOKIE,
            state.cookies.refresh_cookie(&refresh_token, refresh_ttl),
        ),
    ]))
}

fn clear_session_cookies(cookies: CookiePolicy) -> SetCookies {
    AppendHeaders([
        (header::SET_COOKIE, cookies.clear_access_cookie()),
        (header::SET_COOKIE, cookies.clear_refresh_cookie()),
    ])
}

async fn register(
    State(state): State<AuthState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();
    let name = req.name.unwrap_or_default();
    validate_email(&email)?;
    validate_password(&password)?;
    validate_name(&name)?;

    let existing = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to register user")?;
    if existing.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password_hash = hash_password_blocking(password)
        .await
        .db_err("Failed to register user")?;

    let new_user = NewUser {
        email: &email,
        password_hash: &password_hash,
        name: name.trim(),
        role: UserRole::Viewer,
    };
    let user = match state.db.users().create(&new_user).await {
        Ok(user) => user,
        // Lost a race with a concurrent registration
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::bad_request("User already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to register user", e)),
    };

    let cookies = start_session(&state, &user).await?;
    info!(user_id = %user.id, email = %user.email, "User registered");

    Ok((
        StatusCode::CREATED,
        cookies,
        Json(UserResponse {
            user: user.profile(),
        }),
    )
        .into_response())
}

async fn login(
    State(state): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();
    validate_email(&email)?;
    if password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to login")?;

    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let valid = verify_password_blocking(password, hash).await;
    let user = match user {
        Some(user) if valid => user,
        _ => {
            info!(email = %email, "Login failed");
            return Err(AuthError::CredentialsInvalid.into());
        }
    };

    let cookies = start_session(&state, &user).await?;
    info!(user_id = %user.id, email = %user.email, "User logged in");

    Ok((
        cookies,
        Json(UserResponse {
            user: user.profile(),
        }),
    )
        .into_response())
}

/// Storage or signing failure during a refresh. The cause is logged, the client sees a generic 500.
fn refresh_internal(e: impl std::fmt::Display) -> AuthError {
    AuthError::Internal(e.to_string())
}

/// Exchange the refresh cookie for a new access cookie.
///
/// The identity is re-read so the new token carries the current role.
/// The refresh token itself is not rotated.
async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let Some(token) = get_cookie(&headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty()) else {
        return Err(AuthError::RefreshMissing.into());
    };

    let sessions = state.db.sessions();
    let record = sessions
        .find_by_token(token)
        .await
        .map_err(refresh_internal)?
        .ok_or(AuthError::RefreshNotFound)?;

    if record.is_expired_at(unix_now() as i64) {
        sessions
            .delete_by_token(&record.token)
            .await
            .map_err(refresh_internal)?;
        info!(user_id = %record.user_id, "Refresh token expired");
        return Ok((
            clear_session_cookies(state.cookies),
            AuthError::RefreshExpired,
        )
            .into_response());
    }

    let Some(user) = state
        .db
        .users()
        .get_by_id(&record.user_id)
        .await
        .map_err(refresh_internal)?
    else {
        warn!(user_id = %record.user_id, "Refresh token references a missing user");
        return Err(AuthError::RefreshNotFound.into());
    };

    let access = state
        .jwt
        .issue_access_token(&user.id, &user.email, user.role)
        .map_err(refresh_internal)?;
    info!(user_id = %user.id, email = %user.email, "Access token refreshed");

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            state.cookies.access_cookie(&access.token, access.expires_in),
        )]),
        Json(MessageResponse {
            message: "Token refreshed successfully",
        }),
    )
        .into_response())
}

async fn me(State(state): State<AuthState>, auth: Auth<AnyRole>) -> Result<Response, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(auth.user_id())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.profile()).into_response())
}

async fn logout(
    State(state): State<AuthState>,
    auth: Auth<AnyRole>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = get_cookie(&headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty()) {
        state
            .db
            .sessions()
            .delete_by_token(token)
            .await
            .db_err("Failed to logout")?;
    }

    info!(user_id = %auth.user_id(), email = %auth.claims.email, "User logged out");

    Ok((
        clear_session_cookies(state.cookies),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
        .into_response())
}
