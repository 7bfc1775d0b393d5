use serde::{Deserialize, Serialize};
use serde_json::Value;

string_enum!(
    AdminAction {
        Create => "create",
        Update => "update",
        Delete => "delete",
        Approve => "approve",
        Reject => "reject",
        Suspend => "suspend",
        Activate => "activate",
        SettingsChange => "settings_change",
        Reset => "reset",
    }
);

/// Audit record of an admin action; never updated once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLog {
    pub id: String,
    pub admin_id: String,
    pub admin_name: String,
    pub action: AdminAction,
    pub target_table: String,
    pub target_id: Option<String>,
    pub details: Value,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAdminLog {
    pub admin_id: String,
    pub action: AdminAction,
    pub target_table: String,
    pub target_id: Option<String>,
    pub details: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminLogQuery {
    pub action: Option<AdminAction>,
    pub target_table: Option<String>,
    pub admin_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
