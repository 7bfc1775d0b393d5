use axum::http::{Method, StatusCode};
use serde_json::json;

use super::*;

#[tokio::test]
async fn test_register_and_login() {
    let app = create_test_app().await;
    let patient = app.register(Role::Patient, "Jane@Example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "jane@example.com", "password": "password123" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], patient.id.as_str());
    assert_eq!(response.body["user"]["email"], "jane@example.com");
    assert!(response.body["user"].get("password_hash").is_none());

    let me = app.get("/api/auth/me", &patient.token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["role"], "patient");
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let app = create_test_app().await;
    app.register(Role::Patient, "jane@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "JANE@example.com",
                "password": "password123",
                "name": "Other Jane",
                "role": "patient",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["code"], "DUPLICATE_ENTRY");
}

#[tokio::test]
async fn test_admin_self_registration_rejected() {
    let app = create_test_app().await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "boss@example.com",
                "password": "password123",
                "name": "Boss",
                "role": "admin",
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = create_test_app().await;
    app.register(Role::Patient, "jane@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "jane@example.com", "password": "wrong-password" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["detail"], "Invalid email or password");
}

#[tokio::test]
async fn test_suspended_account_is_locked_out() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let suspended = app
        .put(
            &format!("/api/admin/users/{}/status", patient.id),
            &admin.token,
            json!({ "status": "suspended" }),
        )
        .await;
    assert_eq!(suspended.status, StatusCode::OK, "{}", suspended.body);

    let login = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "jane@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.body["detail"], "Account is suspended");

    // Tokens issued before the suspension are refused as well
    let me = app.get("/api/auth/me", &patient.token).await;
    assert_eq!(me.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let app = create_test_app().await;

    let missing = app.request(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let invalid = app.get("/api/auth/me", "not-a-token").await;
    assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
    assert_eq!(invalid.body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_change_password() {
    let app = create_test_app().await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let wrong = app
        .put(
            "/api/auth/password",
            &patient.token,
            json!({ "current_password": "nope-nope", "new_password": "new-password-1" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let changed = app
        .put(
            "/api/auth/password",
            &patient.token,
            json!({ "current_password": "password123", "new_password": "new-password-1" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK, "{}", changed.body);

    let login = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "jane@example.com", "password": "new-password-1" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}
