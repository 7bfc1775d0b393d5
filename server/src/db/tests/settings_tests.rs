//! Tests for the settings store

use serde_json::json;

use super::*;
use crate::models::{
    default_settings, CreateSettingRequest, SettingCategory, SettingQuery, SettingStatus,
    SettingType, SETTING_SLOT_MINUTES,
};

fn request(name: &str, value: serde_json::Value, setting_type: SettingType) -> CreateSettingRequest {
    CreateSettingRequest {
        name: name.to_string(),
        value: value.clone(),
        setting_type,
        category: SettingCategory::General,
        description: None,
        default_value: Some(value),
        validation: None,
        is_required: false,
        is_encrypted: false,
        tags: vec!["ui".to_string()],
        status: None,
    }
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let db = create_test_db().await;

    let first = db.seed_default_settings().await.unwrap();
    let second = db.seed_default_settings().await.unwrap();

    assert_eq!(first, default_settings().len());
    assert_eq!(second, 0);
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let db = create_test_db().await;
    db.create_setting(&request("theme", json!("light"), SettingType::String), None)
        .await
        .unwrap();

    let err = db
        .create_setting(&request("theme", json!("dark"), SettingType::String), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DUPLICATE_ENTRY");
}

#[tokio::test]
async fn test_set_setting_checks_type_and_stamps_user() {
    let db = create_test_db().await;
    db.seed_default_settings().await.unwrap();

    let err = db
        .set_setting(SETTING_SLOT_MINUTES, json!("thirty"), Some("admin-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = db
        .set_setting(SETTING_SLOT_MINUTES, json!(1000), Some("admin-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let updated = db
        .set_setting(SETTING_SLOT_MINUTES, json!(20), Some("admin-1"))
        .await
        .unwrap();
    assert_eq!(updated.value, json!(20));
    assert_eq!(updated.updated_by.as_deref(), Some("admin-1"));

    let minutes: u32 = db.get_setting_value(SETTING_SLOT_MINUTES, 30).await;
    assert_eq!(minutes, 20);

    let err = db.set_setting("no_such_setting", json!(1), None).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_reset_restores_default() {
    let db = create_test_db().await;
    db.seed_default_settings().await.unwrap();
    db.set_setting(SETTING_SLOT_MINUTES, json!(45), None).await.unwrap();

    let reset = db.reset_setting(SETTING_SLOT_MINUTES, None).await.unwrap();

    assert_eq!(reset.value, json!(30));
}

#[tokio::test]
async fn test_deprecated_setting_is_hidden_and_falls_back() {
    let db = create_test_db().await;
    let created = db
        .create_setting(&request("banner_text", json!("Hello"), SettingType::String), None)
        .await
        .unwrap();

    let deprecated = db.deprecate_setting(&created.id, Some("admin-1")).await.unwrap();
    assert_eq!(deprecated.status, SettingStatus::Deprecated);

    assert!(db.get_setting("banner_text").await.unwrap().is_none());
    assert!(db.get_setting_by_id(&created.id).await.unwrap().is_some());
    let value: String = db.get_setting_value("banner_text", "fallback".to_string()).await;
    assert_eq!(value, "fallback");
}

#[tokio::test]
async fn test_category_and_tag_queries() {
    let db = create_test_db().await;
    db.seed_default_settings().await.unwrap();

    let appointment = db
        .get_settings_by_category(SettingCategory::Appointment)
        .await
        .unwrap();
    let names: Vec<&str> = appointment.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "allow_patient_cancellation",
            "appointment_slot_minutes",
            "cancellation_window_hours",
            "max_advance_booking_days",
        ]
    );

    let tagged = db
        .list_settings(&SettingQuery {
            tag: Some("smtp".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].name, "smtp_password");
}

#[tokio::test]
async fn test_public_settings_exclude_sensitive_categories() {
    let db = create_test_db().await;
    db.seed_default_settings().await.unwrap();

    let public = db.list_public_settings().await.unwrap();

    assert!(public.iter().all(|s| !s.is_sensitive()));
    assert!(public.iter().any(|s| s.name == "site_name"));
    assert!(public.iter().all(|s| s.name != "smtp_password"));
    assert!(public.iter().all(|s| s.name != "feature_flags"));
}
