use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, Database};
use crate::error::AppResult;
use crate::models::{
    new_id, now_rfc3339, NewNotification, Notification, NotificationQuery, PageParams,
    Paginated,
};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, link, is_read, created_at";

fn notification_from_row(row: &SqliteRow) -> AppResult<Notification> {
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: enum_column(row, "kind")?,
        title: row.get("title"),
        message: row.get("message"),
        link: row.get("link"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

impl Database {
    pub async fn create_notification(&self, new: NewNotification) -> AppResult<Notification> {
        let notification = Notification {
            id: new_id(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            link: new.link,
            is_read: false,
            created_at: now_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, link, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.link.as_deref())
        .bind(&notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Newest first
    pub async fn list_notifications(
        &self,
        user_id: &str,
        query: &NotificationQuery,
    ) -> AppResult<Paginated<Notification>> {
        let params = PageParams::new(query.page, query.limit);
        let unread_clause = if query.unread_only { " AND is_read = 0" } else { "" };

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?{}",
            unread_clause
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?
        .get(0);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE user_id = ?{}
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
            NOTIFICATION_COLUMNS, unread_clause
        ))
        .bind(user_id)
        .bind(i64::from(params.limit))
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(notification_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    pub async fn count_unread_notifications(&self, user_id: &str) -> AppResult<i64> {
        let total: i64 =
            sqlx::query("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?
                .get(0);
        Ok(total)
    }

    /// Mark one of the user's notifications read; `None` if it is not theirs
    pub async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
    ) -> AppResult<Option<Notification>> {
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ? AND user_id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    /// Returns how many notifications changed
    pub async fn mark_all_notifications_read(&self, user_id: &str) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
