//! What a router state must expose for [`Auth`](super::Auth) to work.

use crate::jwt::JwtConfig;

/// Access to the keys that verify access tokens.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
}

/// Implement [`HasAuthBackend`] for a state struct with a `jwt: Arc<JwtConfig>` field.
///
/// ```ignore
/// #[derive(Clone)]
/// pub struct SessionsState {
///     pub db: Database,
///     pub jwt: Arc<JwtConfig>,
///     pub refresh_ttl: Duration,
/// }
///
/// impl_has_auth_backend!(SessionsState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state:ty) => {
        impl $crate::auth::HasAuthBackend for $state {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
        }
    };
}
