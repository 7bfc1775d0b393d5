use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, json_column, Database, Filter};
use crate::error::AppResult;
use crate::models::{
    new_id, now_rfc3339, AdminLog, AdminLogQuery, NewAdminLog, PageParams, Paginated,
};

const ADMIN_LOG_SELECT: &str = r#"
    SELECT l.id, l.admin_id, COALESCE(u.name, 'deleted user') AS admin_name, l.action,
           l.target_table, l.target_id, l.details, l.created_at
    FROM admin_logs l
    LEFT JOIN users u ON u.id = l.admin_id
"#;

fn admin_log_from_row(row: &SqliteRow) -> AppResult<AdminLog> {
    Ok(AdminLog {
        id: row.get("id"),
        admin_id: row.get("admin_id"),
        admin_name: row.get("admin_name"),
        action: enum_column(row, "action")?,
        target_table: row.get("target_table"),
        target_id: row.get("target_id"),
        details: json_column(row, "details")?,
        created_at: row.get("created_at"),
    })
}

impl Database {
    pub async fn record_admin_log(&self, entry: NewAdminLog) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO admin_logs (id, admin_id, action, target_table, target_id, details, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(&entry.admin_id)
        .bind(entry.action.as_str())
        .bind(&entry.target_table)
        .bind(entry.target_id.as_deref())
        .bind(serde_json::to_string(&entry.details)?)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest first
    pub async fn list_admin_logs(&self, query: &AdminLogQuery) -> AppResult<Paginated<AdminLog>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        if let Some(action) = query.action {
            filter.eq("l.action", action);
        }
        if let Some(table) = &query.target_table {
            filter.eq("l.target_table", table);
        }
        if let Some(admin_id) = &query.admin_id {
            filter.eq("l.admin_id", admin_id);
        }

        let count_sql = format!("SELECT COUNT(*) FROM admin_logs l{}", filter.sql());
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "{}{} ORDER BY l.created_at DESC, l.rowid DESC LIMIT ? OFFSET ?",
            ADMIN_LOG_SELECT,
            filter.sql()
        );
        let rows = filter
            .bind(sqlx::query(&sql))
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(admin_log_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }
}
