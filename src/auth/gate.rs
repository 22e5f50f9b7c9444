//! The two auth gates: who is calling, and may they do this.

use axum::http::HeaderMap;
use tracing::debug;

use super::errors::AuthError;
use super::source::{DEFAULT_TOKEN_SOURCES, find_token};
use crate::db::UserRole;
use crate::jwt::{AccessClaims, JwtConfig, TokenError};

/// Locate and verify the access token on a request.
pub fn authenticate(headers: &HeaderMap, jwt: &JwtConfig) -> Result<AccessClaims, AuthError> {
    let token = find_token(headers, &DEFAULT_TOKEN_SOURCES).ok_or(AuthError::Unauthenticated)?;

    jwt.verify_access_token(token).map_err(|e| {
        debug!(reason = %e, "Rejected access token");
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        }
    })
}

/// Check that an authenticated caller holds one of the allowed roles.
pub fn authorize(claims: Option<&AccessClaims>, allowed: &[UserRole]) -> Result<(), AuthError> {
    let claims = claims.ok_or(AuthError::Unauthenticated)?;
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        debug!(user_id = %claims.sub, role = %claims.role, "Role not permitted");
        Err(AuthError::Forbidden)
    }
}
