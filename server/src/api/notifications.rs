use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use tracing::instrument;

use super::{parse_id, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationQuery, Paginated, UnreadCount};

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> AppResult<Json<Paginated<Notification>>> {
    Ok(Json(state.db.list_notifications(&auth.id, &query).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<UnreadCount>> {
    let unread = state.db.count_unread_notifications(&auth.id).await?;
    Ok(Json(UnreadCount { unread }))
}

#[instrument(skip_all, fields(user_id = %auth.id, notification_id = %id))]
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Notification>> {
    let id = parse_id(&id)?;
    let notification = state
        .db
        .mark_notification_read(&id, &auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification"))?;
    Ok(Json(notification))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let updated = state.db.mark_all_notifications_read(&auth.id).await?;
    tracing::debug!(updated, "Marked notifications read");
    Ok(Json(json!({ "success": true, "updated": updated })))
}

#[instrument(skip_all, fields(user_id = %auth.id, notification_id = %id))]
pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    if !state.db.delete_notification(&id, &auth.id).await? {
        return Err(AppError::not_found("Notification"));
    }
    Ok(Json(json!({ "success": true, "id": id })))
}
