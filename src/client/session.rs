//! Client-side cache of the signed-in user.
//!
//! Display only; every authorization decision is made by the server.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

use crate::db::UserRole;

/// The user as last reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

/// What the application should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut,
    SignedIn,
    /// The refresh token was rejected; send the user to the login screen.
    Expired,
}

#[derive(Clone)]
pub struct SessionCache {
    user: Arc<RwLock<Option<SessionUser>>>,
    status: Arc<watch::Sender<AuthStatus>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCache {
    pub fn new() -> Self {
        let (status, _) = watch::channel(AuthStatus::SignedOut);
        Self {
            user: Arc::new(RwLock::new(None)),
            status: Arc::new(status),
        }
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    /// Watch status changes, e.g. to redirect to the login screen.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn set_user(&self, user: SessionUser) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
        self.status.send_replace(AuthStatus::SignedIn);
    }

    /// Forget the user after an explicit logout.
    pub fn clear(&self) {
        self.reset(AuthStatus::SignedOut);
    }

    /// Forget the user after the session could not be refreshed.
    pub fn expire(&self) {
        self.reset(AuthStatus::Expired);
    }

    fn reset(&self, status: AuthStatus) {
        self.user
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.status.send_replace(status);
    }
}
