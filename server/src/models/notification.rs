use serde::{Deserialize, Serialize};

string_enum!(
    NotificationKind {
        Appointment => "appointment",
        Prescription => "prescription",
        Report => "report",
        Review => "review",
        Chat => "chat",
        System => "system",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Front-end route the notification points at, e.g. `/appointments/<id>`
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

/// Input for creating a notification; built by handlers, never by clients
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}
