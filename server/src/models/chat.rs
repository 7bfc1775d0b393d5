use serde::{Deserialize, Serialize};

use super::Role;
use crate::error::{AppError, AppResult};

pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub body: String,
}

impl SendMessageRequest {
    pub fn validate(&self) -> AppResult<()> {
        let len = self.body.trim().chars().count();
        if len == 0 {
            return Err(AppError::validation("message body is required"));
        }
        if len > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "message body must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        Ok(())
    }
}

/// One entry of the conversation list: the partner plus the latest exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub partner_id: String,
    pub partner_name: String,
    pub partner_role: Role,
    pub last_message: String,
    pub last_message_at: String,
    pub unread_count: i64,
}
