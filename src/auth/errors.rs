//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::api::ErrorDetail;

/// Failures of the auth core. Every variant maps to a generic client message;
/// the specific reason only reaches the logs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email or password did not match")]
    CredentialsInvalid,
    #[error("access token is malformed or has a bad signature")]
    TokenInvalid,
    #[error("access token has expired")]
    TokenExpired,
    #[error("no refresh token was presented")]
    RefreshMissing,
    #[error("refresh token is not in the session store")]
    RefreshNotFound,
    #[error("refresh token has expired")]
    RefreshExpired,
    #[error("role is not permitted for this operation")]
    Forbidden,
    #[error("no access token was presented")]
    Unauthenticated,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthError::CredentialsInvalid => "Invalid credentials",
            AuthError::TokenInvalid | AuthError::TokenExpired => "Invalid or expired token",
            AuthError::RefreshMissing => "No refresh token provided",
            AuthError::RefreshNotFound => "Invalid refresh token",
            AuthError::RefreshExpired => "Refresh token expired",
            AuthError::Forbidden => "Insufficient permissions",
            AuthError::Unauthenticated => "Authentication required",
            AuthError::Internal(_) => "Internal server error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        if let AuthError::Internal(detail) = self {
            error!(error = %detail, "Auth internal error");
            response.extensions_mut().insert(ErrorDetail(detail));
        }

        response
    }
}
