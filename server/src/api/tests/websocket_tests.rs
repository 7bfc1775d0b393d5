use axum::http::{Method, StatusCode};
use serde_json::json;

use super::*;

#[tokio::test]
async fn test_socket_requires_token() {
    let app = create_test_app().await;

    let missing = app.request(Method::GET, "/ws", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["code"], "UNAUTHORIZED");

    let invalid = app.request(Method::GET, "/ws?token=garbage", None, None).await;
    assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_socket_refuses_suspended_account() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    app.put(
        &format!("/api/admin/users/{}/status", patient.id),
        &admin.token,
        json!({ "status": "suspended" }),
    )
    .await;

    let response = app
        .request(Method::GET, &format!("/ws?token={}", patient.token), None, None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["detail"], "Account is suspended");
}

#[tokio::test]
async fn test_valid_token_still_needs_upgrade_request() {
    let app = create_test_app().await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    // Authentication passes; a plain GET is not a WebSocket handshake
    let response = app
        .request(Method::GET, &format!("/ws?token={}", patient.token), None, None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "VALIDATION_ERROR");
}
