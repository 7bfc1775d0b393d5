use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, Database};
use crate::error::AppResult;
use crate::models::{new_id, now_rfc3339, ChatMessage, Conversation};

fn message_from_row(row: &SqliteRow) -> ChatMessage {
    ChatMessage {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        body: row.get("body"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

impl Database {
    pub async fn create_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        body: &str,
    ) -> AppResult<ChatMessage> {
        let message = ChatMessage {
            id: new_id(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            body: body.trim().to_string(),
            is_read: false,
            created_at: now_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, sender_id, recipient_id, body, is_read, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.body)
        .bind(&message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    /// Everyone the user has exchanged messages with, most recent conversation first
    pub async fn list_conversations(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query(
            r#"
            SELECT c.partner_id, u.name AS partner_name, u.role AS partner_role,
                   m.body AS last_message, m.created_at AS last_message_at,
                   (SELECT COUNT(*) FROM chat_messages unread
                    WHERE unread.sender_id = c.partner_id AND unread.recipient_id = ?1
                      AND unread.is_read = 0) AS unread_count
            FROM (
                SELECT DISTINCT CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END
                       AS partner_id
                FROM chat_messages
                WHERE sender_id = ?1 OR recipient_id = ?1
            ) c
            JOIN users u ON u.id = c.partner_id
            JOIN chat_messages m ON m.id = (
                SELECT latest.id FROM chat_messages latest
                WHERE (latest.sender_id = ?1 AND latest.recipient_id = c.partner_id)
                   OR (latest.sender_id = c.partner_id AND latest.recipient_id = ?1)
                ORDER BY latest.created_at DESC, latest.rowid DESC
                LIMIT 1
            )
            ORDER BY m.created_at DESC, m.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Conversation {
                    partner_id: row.get("partner_id"),
                    partner_name: row.get("partner_name"),
                    partner_role: enum_column(row, "partner_role")?,
                    last_message: row.get("last_message"),
                    last_message_at: row.get("last_message_at"),
                    unread_count: row.get("unread_count"),
                })
            })
            .collect()
    }

    /// Thread between two users in chronological order; marks the user's received
    /// messages as read
    pub async fn get_thread(&self, user_id: &str, partner_id: &str) -> AppResult<Vec<ChatMessage>> {
        sqlx::query(
            "UPDATE chat_messages SET is_read = 1
             WHERE sender_id = ? AND recipient_id = ? AND is_read = 0",
        )
        .bind(partner_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query(
            "SELECT id, sender_id, recipient_id, body, is_read, created_at FROM chat_messages
             WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(user_id)
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}
