#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use prime_auth::{
    ServerConfig, create_app,
    db::{Database, NewUser, UserRole},
    jwt::JwtConfig,
    password::hash_password,
};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough!!";
pub const PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    /// Same secret and lifetime as the app, for crafting tokens
    pub jwt: JwtConfig,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}).await
}

pub async fn create_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = ServerConfig::new(db.clone(), TEST_SECRET);
    configure(&mut config);

    TestApp {
        app: create_app(&config),
        jwt: JwtConfig::new(&config.jwt_secret, config.access_ttl),
        db,
    }
}

/// Cookies handed out by register or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub access: String,
    pub refresh: String,
}

impl Session {
    pub fn cookies(&self) -> String {
        format!("access_token={}; refresh_token={}", self.access, self.refresh)
    }

    pub fn access_cookie(&self) -> String {
        format!("access_token={}", self.access)
    }

    pub fn refresh_cookie(&self) -> String {
        format!("refresh_token={}", self.refresh)
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value, cookies: Option<&str>) -> Response<Body> {
        self.send(json_request("POST", uri, Some(body), cookies))
            .await
    }

    pub async fn get(&self, uri: &str, cookies: Option<&str>) -> Response<Body> {
        self.send(json_request("GET", uri, None, cookies)).await
    }

    pub async fn refresh(&self, cookies: Option<&str>) -> Response<Body> {
        self.send(json_request("POST", "/api/auth/refresh", None, cookies))
            .await
    }

    pub async fn register(&self, email: &str, name: &str) -> Session {
        let response = self
            .post_json(
                "/api/auth/register",
                serde_json::json!({ "email": email, "password": PASSWORD, "name": name }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        session_from(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Session {
        let response = self
            .post_json(
                "/api/auth/login",
                serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_from(response).await
    }

    /// Insert a user with the given role directly and log them in.
    pub async fn user_with_role(&self, email: &str, role: UserRole) -> Session {
        let hash = hash_password(PASSWORD).unwrap();
        self.db
            .users()
            .create(&NewUser {
                email,
                password_hash: &hash,
                name: "Test User",
                role,
            })
            .await
            .unwrap();
        self.login(email, PASSWORD).await
    }

    /// An access token for the user that expired long ago.
    pub fn expired_access_token(&self, user_id: &str, email: &str, role: UserRole) -> String {
        self.jwt
            .issue_access_token_at(user_id, email, role, 1_000)
            .unwrap()
            .token
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: Option<Value>,
    cookies: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn session_from(response: Response<Body>) -> Session {
    let cookies = extract_set_cookies(&response);
    let json = body_json(response).await;
    Session {
        user_id: json["user"]["id"].as_str().unwrap().to_string(),
        access: cookie_value(&cookies, "access_token").expect("access cookie"),
        refresh: cookie_value(&cookies, "refresh_token").expect("refresh cookie"),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Extract all Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of a non-empty cookie from Set-Cookie headers
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let pair = c.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

/// Check if cookies contain a new access token
pub fn has_new_access_token(cookies: &[String]) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with("access_token=") && !c.contains("Max-Age=0"))
}

pub const SHORT_ACCESS_TTL: Duration = Duration::from_secs(2);
