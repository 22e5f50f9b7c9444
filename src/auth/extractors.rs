//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use super::gate::{authenticate, authorize};
use super::state::HasAuthBackend;
use crate::db::UserRole;
use crate::jwt::AccessClaims;

/// Trait for role constraints on authentication extractors.
pub trait RoleConstraint {
    const ALLOWED: &'static [UserRole];
}

/// Any authenticated identity.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    const ALLOWED: &'static [UserRole] = &UserRole::ALL;
}

/// Administrators only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    const ALLOWED: &'static [UserRole] = &[UserRole::Admin];
}

/// Extractor for endpoints that require a valid access token and one of the
/// roles allowed by `R`.
///
/// Rejects with 401 when no usable token is present and 403 when the role
/// does not match. The role comes from the token, so a role change takes
/// effect on the next refresh.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub claims: AccessClaims,
    _role: PhantomData<fn() -> R>,
}

impl<R: RoleConstraint> Auth<R> {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> UserRole {
        self.claims.role
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authenticate(&parts.headers, state.jwt())?;
        authorize(Some(&claims), R::ALLOWED)?;
        Ok(Auth {
            claims,
            _role: PhantomData,
        })
    }
}
