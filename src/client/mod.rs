//! Client side of the session protocol.
//!
//! [`RefreshCoordinator`] wraps a [`Transport`] and turns a burst of 401
//! responses into a single `POST /api/auth/refresh`, replaying every affected
//! request once the refresh settles. [`ApiClient`] adds the auth calls and keeps
//! a [`SessionCache`] of the signed-in user.

mod api;
mod coordinator;
mod http;
mod session;

use reqwest::StatusCode;
use serde_json::Value;
use std::future::Future;

pub use api::ApiClient;
pub use coordinator::{RefreshCoordinator, RefreshError};
pub use http::HttpTransport;
pub use session::{AuthStatus, SessionCache, SessionUser};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const ME_PATH: &str = "/api/auth/me";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Endpoints whose 401 means "bad credentials", never "refresh and retry".
const REFRESH_EXEMPT_PATHS: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// A request as the coordinator sees it. Replays are marked `retried`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The same request, marked as already replayed after a refresh.
    pub fn into_retry(mut self) -> Self {
        self.retried = true;
        self
    }

    /// Whether a 401 on this request is final.
    pub fn is_refresh_exempt(&self) -> bool {
        let path = self.path.split('?').next().unwrap_or("");
        REFRESH_EXEMPT_PATHS.contains(&path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The server's `{"error": ...}` message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Sends one request and returns whatever the server answered.
///
/// Implementations must keep cookies between calls; the refresh protocol
/// relies on the `refresh_token` cookie set at login.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// The session could not be refreshed; the user must sign in again.
    #[error("session refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),
    /// A replayed request was rejected again.
    #[error("request was rejected after refreshing the session")]
    Unauthorized,
    #[error("request failed with status {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
