//! Access token gates with role-based access control.
//!
//! Access tokens are short-lived and stateless; they are read from the
//! `access_token` cookie or an `Authorization: Bearer` header. Refresh tokens
//! are opaque, database-tracked, and only handled by the refresh endpoint.

mod cookie;
mod errors;
mod extractors;
mod gate;
mod ip;
mod source;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookiePolicy, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, get_cookie,
};
pub use errors::AuthError;
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use gate::{authenticate, authorize};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use source::{DEFAULT_TOKEN_SOURCES, TokenSource, find_token};
pub use state::HasAuthBackend;
