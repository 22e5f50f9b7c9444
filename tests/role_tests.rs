mod common;

use axum::http::StatusCode;
use common::{PASSWORD, TestApp, body_json, create_test_app, json_request};
use prime_auth::db::UserRole;
use serde_json::{Value, json};

async fn put(t: &TestApp, uri: &str, body: Value, cookies: &str) -> axum::http::Response<axum::body::Body> {
    t.send(json_request("PUT", uri, Some(body), Some(cookies)))
        .await
}

async fn delete(t: &TestApp, uri: &str, cookies: &str) -> axum::http::Response<axum::body::Body> {
    t.send(json_request("DELETE", uri, None, Some(cookies))).await
}

#[tokio::test]
async fn test_admin_routes_by_role() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    let editor = t.user_with_role("editor@example.com", UserRole::Editor).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = t.get("/api/users", Some(&admin.access_cookie())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 3);

    for session in [&editor, &viewer] {
        let response = t.get("/api/users", Some(&session.access_cookie())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "Insufficient permissions");
    }

    let response = t.get("/api/users", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Authentication required");

    let response = t.get("/api/users", Some("access_token=garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_list_users_by_role() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    t.user_with_role("v1@example.com", UserRole::Viewer).await;
    t.user_with_role("v2@example.com", UserRole::Viewer).await;

    let response = t
        .get("/api/users?role=VIEWER", Some(&admin.access_cookie()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let users = json["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u["role"] == "VIEWER"));
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));

    let response = t
        .get("/api/users?role=OWNER", Some(&admin.access_cookie()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_creates_user_with_role() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;

    let body = json!({
        "email": "new@example.com",
        "password": "secret123",
        "name": "New Editor",
        "role": "EDITOR"
    });
    let response = t
        .post_json("/api/users", body.clone(), Some(&admin.access_cookie()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["role"], "EDITOR");
    assert_eq!(json["email"], "new@example.com");

    // The new account can log in
    let session = t.login("new@example.com", "secret123").await;
    assert_eq!(
        t.jwt.verify_access_token(&session.access).unwrap().role,
        UserRole::Editor
    );

    let response = t
        .post_json("/api/users", body, Some(&admin.access_cookie()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .post_json(
            "/api/users",
            json!({ "email": "x@example.com" }),
            Some(&admin.access_cookie()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Email, password, and name are required"
    );
}

#[tokio::test]
async fn test_get_user() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = t
        .get(
            &format!("/api/users/{}", viewer.user_id),
            Some(&admin.access_cookie()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "viewer@example.com");

    let response = t
        .get(
            "/api/users/00000000-0000-4000-8000-000000000000",
            Some(&admin.access_cookie()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;

    let response = delete(
        &t,
        &format!("/api/users/{}", admin.user_id),
        &admin.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Cannot delete your own account"
    );

    assert!(t.db.users().get_by_id(&admin.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_admin_deletes_other_user() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    // Only admins may delete
    let response = delete(
        &t,
        &format!("/api/users/{}", admin.user_id),
        &viewer.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        &admin.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(t.db.users().get_by_id(&viewer.user_id).await.unwrap().is_none());

    // Their refresh tokens went with them
    let response = t.refresh(Some(&viewer.refresh_cookie())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = delete(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        &admin.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_self_update_cannot_change_role() {
    let t = create_test_app().await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = put(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        json!({ "name": "Renamed", "role": "ADMIN", "avatarUrl": "https://example.com/me.png" }),
        &viewer.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Renamed");
    assert_eq!(json["avatarUrl"], "https://example.com/me.png");
    assert_eq!(json["role"], "VIEWER");

    let stored = t.db.users().get_by_id(&viewer.user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, UserRole::Viewer);

    // A refreshed token still carries the old role
    let response = t.refresh(Some(&viewer.refresh_cookie())).await;
    let access =
        common::cookie_value(&common::extract_set_cookies(&response), "access_token").unwrap();
    assert_eq!(
        t.jwt.verify_access_token(&access).unwrap().role,
        UserRole::Viewer
    );
}

#[tokio::test]
async fn test_user_cannot_update_someone_else() {
    let t = create_test_app().await;
    let editor = t.user_with_role("editor@example.com", UserRole::Editor).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = put(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        json!({ "name": "Hijacked" }),
        &editor.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let stored = t.db.users().get_by_id(&viewer.user_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Test User");
}

#[tokio::test]
async fn test_admin_changes_role() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = put(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        json!({ "role": "EDITOR" }),
        &admin.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["role"], "EDITOR");

    // The old access token keeps its role until it is refreshed
    assert_eq!(
        t.jwt.verify_access_token(&viewer.access).unwrap().role,
        UserRole::Viewer
    );
    let response = t.refresh(Some(&viewer.refresh_cookie())).await;
    let access =
        common::cookie_value(&common::extract_set_cookies(&response), "access_token").unwrap();
    assert_eq!(
        t.jwt.verify_access_token(&access).unwrap().role,
        UserRole::Editor
    );
}

#[tokio::test]
async fn test_password_change() {
    let t = create_test_app().await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = put(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        json!({ "password": "brand-new-pass" }),
        &viewer.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .post_json(
            "/api/auth/login",
            json!({ "email": "viewer@example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    t.login("viewer@example.com", "brand-new-pass").await;
}

#[tokio::test]
async fn test_update_email_conflict() {
    let t = create_test_app().await;
    t.user_with_role("taken@example.com", UserRole::Viewer).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;

    let response = put(
        &t,
        &format!("/api/users/{}", viewer.user_id),
        json!({ "email": "taken@example.com" }),
        &viewer.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email already in use");
}

#[tokio::test]
async fn test_admin_revokes_sessions() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    let first = t.user_with_role("viewer@example.com", UserRole::Viewer).await;
    let second = t.login("viewer@example.com", PASSWORD).await;

    let response = delete(
        &t,
        &format!("/api/users/{}/sessions", first.user_id),
        &admin.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "revoked": 2 }));

    for session in [&first, &second] {
        let response = t.refresh(Some(&session.refresh_cookie())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The admin's own session is untouched
    let response = t.refresh(Some(&admin.refresh_cookie())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = delete(
        &t,
        &format!("/api/users/{}/sessions", first.user_id),
        &first.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_role_value() {
    let t = create_test_app().await;
    let admin = t.user_with_role("admin@example.com", UserRole::Admin).await;
    let viewer = t.user_with_role("viewer@example.com", UserRole::Viewer).await;
    let uri = format!("/api/users/{}", viewer.user_id);

    // Dropped with the other fields a viewer may not set
    let response = put(
        &t,
        &uri,
        json!({ "name": "Renamed", "role": "SUPERUSER" }),
        &viewer.access_cookie(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Renamed");
    assert_eq!(json["role"], "VIEWER");

    // An admin may set roles, so a bad value is an error
    let response = put(&t, &uri, json!({ "role": "SUPERUSER" }), &admin.access_cookie()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid role");
}
