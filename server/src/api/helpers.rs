//! Side effects shared by handlers: realtime pushes, notifications and the admin audit log

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::{AppState, AuthUser};
use crate::models::{AdminAction, NewAdminLog, NewNotification, NotificationKind};

pub const EVENT_NOTIFICATION: &str = "notification";
pub const EVENT_CHAT_MESSAGE: &str = "chat_message";
pub const EVENT_APPOINTMENT_UPDATED: &str = "appointment_updated";

/// Message relayed to one user's open WebSocket sessions
#[derive(Debug, Clone)]
pub struct RealtimeEvent {
    pub recipient_id: String,
    pub event: &'static str,
    pub payload: Value,
}

impl RealtimeEvent {
    /// Text frame format: `<event>:<json>`
    pub fn frame(&self) -> String {
        format!("{}:{}", self.event, self.payload)
    }
}

/// Push an event to a user; silently dropped when nobody is connected
pub fn push_event<T: Serialize>(state: &AppState, recipient_id: &str, event: &'static str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(payload) => {
            let _ = state.tx.send(RealtimeEvent {
                recipient_id: recipient_id.to_string(),
                event,
                payload,
            });
        }
        Err(e) => {
            tracing::error!(event, error = %e, "Failed to serialize realtime payload");
        }
    }
}

/// Store a notification and push it to the recipient. Failures are logged; the
/// triggering operation has already succeeded.
pub async fn notify(
    state: &AppState,
    user_id: &str,
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    link: Option<String>,
) {
    let new = NewNotification {
        user_id: user_id.to_string(),
        kind,
        title: title.into(),
        message: message.into(),
        link,
    };

    match state.db.create_notification(new).await {
        Ok(notification) => {
            push_event(state, user_id, EVENT_NOTIFICATION, &notification);
        }
        Err(e) => {
            tracing::error!(user_id, kind = %kind, error = %e, "Failed to create notification");
        }
    }
}

/// Append an audit entry for an admin action
pub async fn record_admin_action(
    state: &AppState,
    admin: &AuthUser,
    action: AdminAction,
    target_table: &str,
    target_id: Option<&str>,
    details: Value,
) {
    let entry = NewAdminLog {
        admin_id: admin.id.clone(),
        action,
        target_table: target_table.to_string(),
        target_id: target_id.map(str::to_string),
        details,
    };

    if let Err(e) = state.db.record_admin_log(entry).await {
        tracing::error!(
            admin_id = %admin.id,
            action = %action,
            target_table,
            error = %e,
            "Failed to record admin action"
        );
    } else {
        tracing::info!(admin_id = %admin.id, action = %action, target_table, ?target_id, "Admin action recorded");
    }
}

pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
