//! Application settings endpoints
//!
//! Administrators manage typed settings; sensitive values (passwords, encrypted
//! entries) are always masked in responses. A small public subset is exposed
//! without authentication for front-end display.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::helpers::record_admin_action;
use super::{parse_id, ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{
    AdminAction, CreateSettingRequest, Role, SetSettingValueRequest, Setting, SettingCategory,
    SettingQuery, UpdateSettingRequest, MASKED_VALUE,
};

fn masked(settings: Vec<Setting>) -> Vec<Setting> {
    settings.into_iter().map(Setting::masked).collect()
}

/// The placeholder sent back unchanged means "keep the stored secret"
fn is_masked_placeholder(value: &Value) -> bool {
    value.as_str() == Some(MASKED_VALUE)
}

#[instrument(skip_all, fields(admin_id = %auth.id))]
pub async fn list_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<SettingQuery>,
) -> AppResult<Json<Vec<Setting>>> {
    auth.require_role(&[Role::Admin])?;

    let settings = state.db.list_settings(&query).await?;
    tracing::debug!(count = settings.len(), "Listed settings");
    Ok(Json(masked(settings)))
}

#[instrument(skip_all, fields(admin_id = %auth.id, category = %category))]
pub async fn get_settings_by_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(category): Path<String>,
) -> AppResult<Json<Vec<Setting>>> {
    auth.require_role(&[Role::Admin])?;

    let category: SettingCategory = category.parse()?;
    Ok(Json(masked(state.db.get_settings_by_category(category).await?)))
}

#[instrument(skip_all, fields(admin_id = %auth.id, setting = %name))]
pub async fn get_setting_by_name(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> AppResult<Json<Setting>> {
    auth.require_role(&[Role::Admin])?;
    Ok(Json(state.db.require_setting(&name).await?.masked()))
}

#[instrument(skip_all, fields(admin_id = %auth.id, setting_id = %id))]
pub async fn get_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Setting>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    Ok(Json(state.db.require_setting_by_id(&id).await?.masked()))
}

#[instrument(skip_all, fields(admin_id = %auth.id, setting = %req.name))]
pub async fn create_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateSettingRequest>,
) -> AppResult<(StatusCode, Json<Setting>)> {
    auth.require_role(&[Role::Admin])?;
    req.validate()?;

    let setting = state.db.create_setting(&req, Some(&auth.id)).await?;

    record_admin_action(
        &state,
        &auth,
        AdminAction::Create,
        "settings",
        Some(&setting.id),
        json!({
            "name": setting.name,
            "category": setting.category,
            "setting_type": setting.setting_type,
        }),
    )
    .await;

    tracing::info!(setting_id = %setting.id, "Setting created");
    Ok((StatusCode::CREATED, Json(setting.masked())))
}

#[instrument(skip_all, fields(admin_id = %auth.id, setting_id = %id))]
pub async fn update_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(mut req): ApiJson<UpdateSettingRequest>,
) -> AppResult<Json<Setting>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    let current = state.db.require_setting_by_id(&id).await?;
    if current.is_sensitive() {
        req.value = req.value.filter(|value| !is_masked_placeholder(value));
        req.default_value = req.default_value.filter(|value| !is_masked_placeholder(value));
    }

    let value_changed = req.value.as_ref().is_some_and(|value| *value != current.value);
    let updated = req.apply(current.clone())?;
    let setting = state.db.save_setting(&updated, Some(&auth.id)).await?;

    let mut details = json!({ "name": setting.name });
    if value_changed && !setting.is_sensitive() {
        details["value"] = json!({ "from": current.value, "to": setting.value });
    }
    if current.status != setting.status {
        details["status"] = json!({ "from": current.status, "to": setting.status });
    }
    record_admin_action(
        &state,
        &auth,
        AdminAction::SettingsChange,
        "settings",
        Some(&id),
        details,
    )
    .await;

    tracing::info!(setting = %setting.name, value_changed, "Setting updated");
    Ok(Json(setting.masked()))
}

/// Soft delete; the setting is kept with status `deprecated`
#[instrument(skip_all, fields(admin_id = %auth.id, setting_id = %id))]
pub async fn delete_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Setting>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    let setting = state.db.deprecate_setting(&id, Some(&auth.id)).await?;

    record_admin_action(
        &state,
        &auth,
        AdminAction::Delete,
        "settings",
        Some(&id),
        json!({ "name": setting.name, "soft_delete": true }),
    )
    .await;

    tracing::info!(setting = %setting.name, "Setting deprecated");
    Ok(Json(setting.masked()))
}

#[instrument(skip_all, fields(admin_id = %auth.id, setting = %name))]
pub async fn set_setting_value(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
    ApiJson(req): ApiJson<SetSettingValueRequest>,
) -> AppResult<Json<Setting>> {
    auth.require_role(&[Role::Admin])?;

    let previous = state.db.require_setting(&name).await?;
    if previous.is_sensitive() && is_masked_placeholder(&req.value) {
        return Ok(Json(previous.masked()));
    }

    let setting = state
        .db
        .set_setting(&name, req.value, Some(&auth.id))
        .await?;

    let details = if setting.is_sensitive() {
        json!({ "name": name })
    } else {
        json!({ "name": name, "value": { "from": previous.value, "to": setting.value } })
    };
    record_admin_action(
        &state,
        &auth,
        AdminAction::SettingsChange,
        "settings",
        Some(&setting.id),
        details,
    )
    .await;

    tracing::info!("Setting value changed");
    Ok(Json(setting.masked()))
}

#[instrument(skip_all, fields(admin_id = %auth.id, setting = %name))]
pub async fn reset_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> AppResult<Json<Setting>> {
    auth.require_role(&[Role::Admin])?;

    let setting = state.db.reset_setting(&name, Some(&auth.id)).await?;

    record_admin_action(
        &state,
        &auth,
        AdminAction::Reset,
        "settings",
        Some(&setting.id),
        json!({ "name": name }),
    )
    .await;

    tracing::info!("Setting reset to default");
    Ok(Json(setting.masked()))
}

/// Name to value map of the settings the front end may show to anyone
#[instrument(skip_all)]
pub async fn public_settings(
    State(state): State<AppState>,
) -> AppResult<Json<BTreeMap<String, Value>>> {
    let settings = state.db.list_public_settings().await?;
    Ok(Json(
        settings
            .into_iter()
            .map(|setting| (setting.name, setting.value))
            .collect(),
    ))
}
