use axum::http::StatusCode;
use serde_json::json;

use super::*;
use crate::api::helpers::{EVENT_CHAT_MESSAGE, EVENT_NOTIFICATION};

#[tokio::test]
async fn test_message_requires_shared_appointment() {
    let app = create_test_app().await;
    let doctor = app.approved_doctor("house@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let before = app
        .post(
            "/api/chat/messages",
            &patient.token,
            json!({ "recipient_id": doctor.id, "body": "Hello doctor" }),
        )
        .await;
    assert_eq!(before.status, StatusCode::FORBIDDEN);

    app.book(&patient, &doctor, "10:00").await;

    let after = app
        .post(
            "/api/chat/messages",
            &patient.token,
            json!({ "recipient_id": doctor.id, "body": "Hello doctor" }),
        )
        .await;
    assert_eq!(after.status, StatusCode::CREATED, "{}", after.body);
    assert_eq!(after.body["sender_id"], patient.id.as_str());
}

#[tokio::test]
async fn test_patients_cannot_message_each_other() {
    let app = create_test_app().await;
    let jane = app.register(Role::Patient, "jane@example.com").await;
    let john = app.register(Role::Patient, "john@example.com").await;

    let response = app
        .post(
            "/api/chat/messages",
            &jane.token,
            json!({ "recipient_id": john.id, "body": "Hi" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let to_self = app
        .post(
            "/api/chat/messages",
            &jane.token,
            json!({ "recipient_id": jane.id, "body": "Note to self" }),
        )
        .await;
    assert_eq!(to_self.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_may_message_anyone() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let sent = app
        .post(
            "/api/chat/messages",
            &admin.token,
            json!({ "recipient_id": patient.id, "body": "Welcome to the clinic" }),
        )
        .await;
    assert_eq!(sent.status, StatusCode::CREATED);

    let reply = app
        .post(
            "/api/chat/messages",
            &patient.token,
            json!({ "recipient_id": admin.id, "body": "Thanks!" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_thread_and_conversations() {
    let app = create_test_app().await;
    let doctor = app.approved_doctor("house@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;
    app.book(&patient, &doctor, "10:00").await;

    for body in ["First", "Second"] {
        app.post(
            "/api/chat/messages",
            &patient.token,
            json!({ "recipient_id": doctor.id, "body": body }),
        )
        .await;
    }

    let conversations = app.get("/api/chat/conversations", &doctor.token).await;
    assert_eq!(conversations.status, StatusCode::OK);
    let entry = &conversations.body[0];
    assert_eq!(entry["partner_id"], patient.id.as_str());
    assert_eq!(entry["last_message"], "Second");
    assert_eq!(entry["unread_count"], 2);

    let thread = app
        .get(&format!("/api/chat/messages/{}", patient.id), &doctor.token)
        .await;
    let bodies: Vec<&str> = thread
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["body"].as_str())
        .collect();
    assert_eq!(bodies, vec!["First", "Second"]);

    // Reading the thread clears the unread count
    let conversations = app.get("/api/chat/conversations", &doctor.token).await;
    assert_eq!(conversations.body[0]["unread_count"], 0);
}

#[tokio::test]
async fn test_message_is_pushed_to_recipient() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let patient = app.register(Role::Patient, "jane@example.com").await;
    let mut rx = app.state.tx.subscribe();

    app.post(
        "/api/chat/messages",
        &admin.token,
        json!({ "recipient_id": patient.id, "body": "Your results are ready" }),
    )
    .await;

    let chat = rx.try_recv().unwrap();
    assert_eq!(chat.recipient_id, patient.id);
    assert_eq!(chat.event, EVENT_CHAT_MESSAGE);
    assert!(chat.frame().starts_with("chat_message:{"));

    let notification = rx.try_recv().unwrap();
    assert_eq!(notification.event, EVENT_NOTIFICATION);
    assert_eq!(notification.payload["kind"], "chat");
    assert_eq!(notification.payload["message"], "Your results are ready");
}
