//! Cookie parsing and `Set-Cookie` construction.

use axum::http::header;

/// Cookie name for the access token (short-lived).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// The refresh cookie is only sent to the auth endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Cookie attributes that depend on the deployment mode.
///
/// Production runs cross-site behind HTTPS, so cookies get `Secure` and
/// `SameSite=None`. Development uses `SameSite=Lax` without `Secure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub production: bool,
}

impl CookiePolicy {
    pub fn new(production: bool) -> Self {
        Self { production }
    }

    fn attributes(&self) -> &'static str {
        if self.production {
            "HttpOnly; Secure; SameSite=None"
        } else {
            "HttpOnly; SameSite=Lax"
        }
    }

    fn build(&self, name: &str, value: &str, path: &str, max_age: u64) -> String {
        format!(
            "{}={}; {}; Path={}; Max-Age={}",
            name,
            value,
            self.attributes(),
            path,
            max_age
        )
    }

    pub fn access_cookie(&self, token: &str, max_age: u64) -> String {
        self.build(ACCESS_COOKIE_NAME, token, "/", max_age)
    }

    pub fn refresh_cookie(&self, token: &str, max_age: u64) -> String {
        self.build(REFRESH_COOKIE_NAME, token, REFRESH_COOKIE_PATH, max_age)
    }

    pub fn clear_access_cookie(&self) -> String {
        self.build(ACCESS_COOKIE_NAME, "", "/", 0)
    }

    pub fn clear_refresh_cookie(&self) -> String {
        self.build(REFRESH_COOKIE_NAME, "", REFRESH_COOKIE_PATH, 0)
    }
}
