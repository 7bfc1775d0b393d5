//! User accounts and the per-role profile rows created alongside them

use std::collections::BTreeMap;

use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, like, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    now_rfc3339, ApprovalStatus, PageParams, Paginated, Role, User, UserQuery, UserStatus,
};

const USER_COLUMNS: &str = "id, email, password_hash, name, phone, role, status, \
                            created_at, updated_at, last_login_at";

pub(crate) fn user_from_row(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        name: row.get("name"),
        phone: row.get("phone"),
        role: enum_column(row, "role")?,
        status: enum_column(row, "status")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_login_at: row.get("last_login_at"),
    })
}

fn user_sort(sort: Option<&str>) -> &'static str {
    match sort {
        Some("name") => "name ASC",
        Some("-name") => "name DESC",
        Some("email") => "email ASC",
        Some("created") => "created_at ASC",
        _ => "created_at DESC",
    }
}

impl Database {
    /// Insert a user plus the empty profile row its role requires
    pub async fn create_user(&self, user: &User, specialization: Option<&str>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, phone, role, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(&mut *tx)
        .await?;

        match user.role {
            Role::Doctor => {
                sqlx::query(
                    "INSERT INTO doctor_profiles (user_id, specialization, approval_status, updated_at)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&user.id)
                .bind(specialization.unwrap_or_default().trim())
                .bind(ApprovalStatus::Pending.as_str())
                .bind(&user.created_at)
                .execute(&mut *tx)
                .await?;
            }
            Role::Patient => {
                sqlx::query("INSERT INTO patient_profiles (user_id, updated_at) VALUES (?, ?)")
                    .bind(&user.id)
                    .bind(&user.created_at)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Admin => {}
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Lookup is case-insensitive
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn require_user(&self, id: &str) -> AppResult<User> {
        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn list_users(&self, query: &UserQuery) -> AppResult<Paginated<User>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        if let Some(role) = query.role {
            filter.eq("role", role);
        }
        if let Some(status) = query.status {
            filter.eq("status", status);
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.add("(name LIKE ? OR email LIKE ?)", [like(search), like(search)]);
        }

        let count_sql = format!("SELECT COUNT(*) FROM users{}", filter.sql());
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "SELECT {} FROM users{} ORDER BY {} LIMIT ? OFFSET ?",
            USER_COLUMNS,
            filter.sql(),
            user_sort(query.sort.as_deref())
        );
        let rows = filter
            .bind(sqlx::query(&sql))
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows.iter().map(user_from_row).collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    pub async fn update_user_status(&self, id: &str, status: UserStatus) -> AppResult<User> {
        let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        self.require_user(id).await
    }

    /// Update the contact fields shared by every role; `None` leaves a field unchanged
    pub async fn update_user_contact(
        &self,
        id: &str,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET name = COALESCE(?, name), phone = COALESCE(?, phone), updated_at = ?
             WHERE id = ?",
        )
        .bind(name.map(str::trim))
        .bind(phone.map(str::trim))
        .bind(now_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_password_hash(&self, id: &str, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_login(&self, id: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a user; profile rows, appointments and messages cascade
    pub async fn delete_user(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_users_by_role(&self) -> AppResult<BTreeMap<String, i64>> {
        let rows = sqlx::query("SELECT role, COUNT(*) AS total FROM users GROUP BY role")
            .fetch_all(&self.pool)
            .await?;

        let mut counts: BTreeMap<String, i64> = Role::ALL
            .iter()
            .map(|role| (role.to_string(), 0))
            .collect();
        for row in rows {
            counts.insert(row.get("role"), row.get("total"));
        }
        Ok(counts)
    }
}
