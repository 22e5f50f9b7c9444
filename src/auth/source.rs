//! Where an access token may be presented on a request.

use axum::http::{HeaderMap, header};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};

/// One strategy for locating an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// A named cookie.
    Cookie(&'static str),
    /// `Authorization: Bearer <token>`.
    Bearer,
}

/// Sources tried in order by the auth gate: the access cookie, then the bearer header.
pub const DEFAULT_TOKEN_SOURCES: [TokenSource; 2] =
    [TokenSource::Cookie(ACCESS_COOKIE_NAME), TokenSource::Bearer];

impl TokenSource {
    pub fn extract<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let token = match self {
            TokenSource::Cookie(name) => get_cookie(headers, name)?,
            TokenSource::Bearer => {
                let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
                let (scheme, token) = value.split_once(' ')?;
                if !scheme.eq_ignore_ascii_case("bearer") {
                    return None;
                }
                token.trim()
            }
        };
        (!token.is_empty()).then_some(token)
    }
}

/// Return the token from the first source that yields one.
pub fn find_token<'a>(headers: &'a HeaderMap, sources: &[TokenSource]) -> Option<&'a str> {
    sources.iter().find_map(|source| source.extract(headers))
}
