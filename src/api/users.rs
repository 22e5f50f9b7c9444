//! User management. Admin-only except for self-updates.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::validate::{validate_email, validate_name, validate_password};
use crate::auth::{AdminOnly, AnyRole, Auth, AuthError};
use crate::db::{Database, NewUser, UserChanges, UserProfile, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password::hash_password_blocking;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/{id}/sessions", delete(revoke_sessions))
        .with_state(state)
}

/// A field a caller may change through `PUT /users/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Name,
    Email,
    AvatarUrl,
    Password,
    Role,
}

const SELF_SERVICE_FIELDS: &[UserField] = &[
    UserField::Name,
    UserField::Email,
    UserField::AvatarUrl,
    UserField::Password,
];

const ADMIN_FIELDS: &[UserField] = &[
    UserField::Name,
    UserField::Email,
    UserField::AvatarUrl,
    UserField::Password,
    UserField::Role,
];

/// Fields the caller's role may write. Everything else in a request is dropped.
pub fn permitted_fields(role: UserRole) -> &'static [UserField] {
    match role {
        UserRole::Admin => ADMIN_FIELDS,
        UserRole::Editor | UserRole::Viewer => SELF_SERVICE_FIELDS,
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub password: Option<String>,
    /// Parsed only when the caller may set it, so an unknown value from a
    /// non-admin is dropped like any other forbidden field.
    pub role: Option<String>,
}

impl UpdateUserRequest {
    /// Keep only the fields in `allowed`.
    pub fn restrict_to(self, allowed: &[UserField]) -> Self {
        let keep = |field: UserField| allowed.contains(&field);
        Self {
            name: self.name.filter(|_| keep(UserField::Name)),
            email: self.email.filter(|_| keep(UserField::Email)),
            avatar_url: self.avatar_url.filter(|_| keep(UserField::AvatarUrl)),
            password: self.password.filter(|_| keep(UserField::Password)),
            role: self.role.filter(|_| keep(UserField::Role)),
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    role: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    data: Vec<UserProfile>,
}

#[derive(Deserialize)]
struct CreateUserRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    role: Option<UserRole>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct RevokeResponse {
    revoked: u64,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn list_users(
    State(state): State<UsersState>,
    _auth: Auth<AdminOnly>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let role = match query.role.as_deref().filter(|r| !r.is_empty()) {
        Some(role) => Some(UserRole::parse(role).ok_or_else(|| ApiError::bad_request("Invalid role"))?),
        None => None,
    };

    let users = state
        .db
        .users()
        .list(role)
        .await
        .db_err("Failed to fetch users")?;

    Ok(Json(ListResponse {
        data: users.iter().map(|u| u.profile()).collect(),
    }))
}

async fn create_user(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password), Some(name)) = (req.email, req.password, req.name) else {
        return Err(ApiError::bad_request(
            "Email, password, and name are required",
        ));
    };
    validate_email(&email)?;
    validate_password(&password)?;
    validate_name(&name)?;

    let password_hash = hash_password_blocking(password)
        .await
        .db_err("Failed to create user")?;

    let new_user = NewUser {
        email: &email,
        password_hash: &password_hash,
        name: name.trim(),
        role: req.role.unwrap_or_default(),
    };
    let user = match state.db.users().create(&new_user).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::bad_request("User with this email already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    info!(user_id = %user.id, email = %user.email, role = %user.role, by = %auth.claims.email, "User created");

    Ok((StatusCode::CREATED, Json(user.profile())))
}

async fn get_user(
    State(state): State<UsersState>,
    _auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let user = state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to fetch user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.profile()))
}

async fn update_user(
    State(state): State<UsersState>,
    auth: Auth<AnyRole>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.role() != UserRole::Admin && auth.user_id() != id {
        return Err(AuthError::Forbidden.into());
    }
    validate_uuid(&id)?;

    let existing = state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to update user")?;
    if existing.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let req = req.restrict_to(permitted_fields(auth.role()));
    let role = req
        .role
        .as_deref()
        .map(|role| UserRole::parse(role).ok_or_else(|| ApiError::bad_request("Invalid role")))
        .transpose()?;
    if let Some(email) = &req.email {
        validate_email(email)?;
    }
    if let Some(name) = &req.name {
        validate_name(name)?;
    }
    let password_hash = match req.password {
        Some(password) => {
            validate_password(&password)?;
            Some(
                hash_password_blocking(password)
                    .await
                    .db_err("Failed to update user")?,
            )
        }
        None => None,
    };

    let changes = UserChanges {
        email: req.email,
        name: req.name.map(|n| n.trim().to_string()),
        avatar_url: req.avatar_url,
        password_hash,
        role,
    };

    let user = match state.db.users().update(&id, &changes).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::not_found("User not found")),
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::bad_request("Email already in use"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update user", e)),
    };

    info!(user_id = %user.id, by = %auth.claims.email, "User updated");

    Ok(Json(user.profile()))
}

async fn delete_user(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let existing = state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to delete user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if auth.user_id() == id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    state
        .db
        .users()
        .delete(&id)
        .await
        .db_err("Failed to delete user")?;

    info!(user_id = %id, email = %existing.email, by = %auth.claims.email, "User deleted");

    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}

/// Delete every refresh token of a user. Access tokens already issued stay
/// valid until they expire.
async fn revoke_sessions(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    if state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to revoke sessions")?
        .is_none()
    {
        return Err(ApiError::not_found("User not found"));
    }

    let revoked = state
        .db
        .sessions()
        .delete_all_for_user(&id)
        .await
        .db_err("Failed to revoke sessions")?;

    info!(user_id = %id, revoked, by = %auth.claims.email, "Sessions revoked");

    Ok(Json(RevokeResponse { revoked }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> UpdateUserRequest {
        UpdateUserRequest {
            name: Some("New".into()),
            email: Some("new@example.com".into()),
            avatar_url: Some("https://example.com/a.png".into()),
            password: Some("secret123".into()),
            role: Some("ADMIN".into()),
        }
    }

    #[test]
    fn test_non_admin_cannot_set_role() {
        let restricted = full_request().restrict_to(permitted_fields(UserRole::Viewer));

        assert_eq!(restricted.role, None);
        assert_eq!(restricted.name.as_deref(), Some("New"));
        assert_eq!(restricted.email.as_deref(), Some("new@example.com"));
        assert!(restricted.password.is_some());
        assert!(restricted.avatar_url.is_some());

        let restricted = full_request().restrict_to(permitted_fields(UserRole::Editor));
        assert_eq!(restricted.role, None);
    }

    #[test]
    fn test_admin_keeps_every_field() {
        let restricted = full_request().restrict_to(permitted_fields(UserRole::Admin));
        assert_eq!(restricted, full_request());
    }

    #[test]
    fn test_unknown_json_fields_are_ignored() {
        let req: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "name": "Eve",
            "id": "some-other-id",
            "passwordHash": "$2b$10$injected",
            "createdAt": "2000-01-01"
        }))
        .unwrap();

        assert_eq!(
            req,
            UpdateUserRequest {
                name: Some("Eve".into()),
                ..Default::default()
            }
        );
    }
}
