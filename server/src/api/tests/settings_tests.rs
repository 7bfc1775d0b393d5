use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use super::*;

fn smtp_host() -> Value {
    json!({
        "name": "smtp_host",
        "value": "mail.clinic.example",
        "setting_type": "string",
        "category": "email",
        "description": "Outgoing mail relay",
        "default_value": "localhost",
        "is_required": true,
        "tags": ["smtp"],
    })
}

#[tokio::test]
async fn test_create_and_fetch_setting() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    let created = app.post("/api/admin/settings", &admin.token, smtp_host()).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let id = created.body["id"].as_str().unwrap().to_string();
    assert_eq!(created.body["status"], "active");

    let by_id = app.get(&format!("/api/admin/settings/{}", id), &admin.token).await;
    assert_eq!(by_id.body["name"], "smtp_host");

    let by_name = app.get("/api/admin/settings/name/smtp_host", &admin.token).await;
    assert_eq!(by_name.body["id"], id.as_str());

    let email = app.get("/api/admin/settings/category/email", &admin.token).await;
    let names: Vec<&str> = email
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&"smtp_host"));
    assert!(names.contains(&"smtp_password"));

    let duplicate = app.post("/api/admin/settings", &admin.token, smtp_host()).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_settings_are_admin_only() {
    let app = create_test_app().await;
    let patient = app.register(Role::Patient, "jane@example.com").await;

    let list = app.get("/api/admin/settings", &patient.token).await;
    assert_eq!(list.status, StatusCode::FORBIDDEN);
    assert_eq!(list.body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_invalid_category_and_type_mismatch() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    let category = app.get("/api/admin/settings/category/weather", &admin.token).await;
    assert_eq!(category.status, StatusCode::BAD_REQUEST);

    let wrong_type = app
        .put(
            "/api/admin/settings/name/appointment_slot_minutes/value",
            &admin.token,
            json!({ "value": "thirty" }),
        )
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);

    let out_of_range = app
        .put(
            "/api/admin/settings/name/appointment_slot_minutes/value",
            &admin.token,
            json!({ "value": 500 }),
        )
        .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);

    let bad_choice = app
        .put(
            "/api/admin/settings/name/default_currency/value",
            &admin.token,
            json!({ "value": "BTC" }),
        )
        .await;
    assert_eq!(bad_choice.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_settings_are_masked() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    let set = app
        .put(
            "/api/admin/settings/name/smtp_password/value",
            &admin.token,
            json!({ "value": "hunter22" }),
        )
        .await;
    assert_eq!(set.status, StatusCode::OK);
    assert_eq!(set.body["value"], "********");

    // Echoing the placeholder back keeps the stored secret
    let id = set.body["id"].as_str().unwrap().to_string();
    let echoed = app
        .put(
            &format!("/api/admin/settings/{}", id),
            &admin.token,
            json!({ "value": "********", "description": "Relay password" }),
        )
        .await;
    assert_eq!(echoed.status, StatusCode::OK, "{}", echoed.body);
    assert_eq!(echoed.body["description"], "Relay password");

    let stored: String = app.state.db.get_setting_value("smtp_password", String::new()).await;
    assert_eq!(stored, "hunter22");

    let public = app
        .request(Method::GET, "/api/settings/public", None, None)
        .await;
    assert_eq!(public.status, StatusCode::OK);
    assert!(public.body.get("smtp_password").is_none());
    assert_eq!(public.body["site_name"], "MediBook");
    assert_eq!(public.body["appointment_slot_minutes"], 30);
}

#[tokio::test]
async fn test_reset_restores_default() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    app.put(
        "/api/admin/settings/name/site_name/value",
        &admin.token,
        json!({ "value": "Riverside Clinic" }),
    )
    .await;
    let changed = app.get("/api/admin/settings/name/site_name", &admin.token).await;
    assert_eq!(changed.body["value"], "Riverside Clinic");

    let reset = app
        .request(
            Method::POST,
            "/api/admin/settings/name/site_name/reset",
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["value"], "MediBook");
}

#[tokio::test]
async fn test_delete_deprecates_setting() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let created = app.post("/api/admin/settings", &admin.token, smtp_host()).await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let deleted = app.delete(&format!("/api/admin/settings/{}", id), &admin.token).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["status"], "deprecated");

    // Still reachable by id, gone by name
    let by_id = app.get(&format!("/api/admin/settings/{}", id), &admin.token).await;
    assert_eq!(by_id.status, StatusCode::OK);
    let by_name = app.get("/api/admin/settings/name/smtp_host", &admin.token).await;
    assert_eq!(by_name.status, StatusCode::NOT_FOUND);

    let logs = app.get("/api/admin/logs?action=delete", &admin.token).await;
    assert_eq!(logs.body["total"], 1);
    assert_eq!(logs.body["items"][0]["target_table"], "settings");
}

#[tokio::test]
async fn test_value_change_is_audited() {
    let app = create_test_app().await;
    let admin = app.admin("admin@example.com").await;

    app.put(
        "/api/admin/settings/name/cancellation_window_hours/value",
        &admin.token,
        json!({ "value": 24 }),
    )
    .await;

    let logs = app.get("/api/admin/logs", &admin.token).await;
    assert_eq!(logs.status, StatusCode::OK);
    let entry = &logs.body["items"][0];
    assert_eq!(entry["action"], "settings_change");
    assert_eq!(entry["details"]["value"]["from"], 2);
    assert_eq!(entry["details"]["value"]["to"], 24);
}
