//! Settings store
//!
//! Besides plain CRUD this provides the lookups business rules use:
//! [`Database::get_setting`], [`Database::get_settings_by_category`],
//! [`Database::set_setting`], [`Database::get_setting_value`] and
//! [`Database::reset_setting`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, json_column, like, optional_json_column, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    default_settings, new_id, now_rfc3339, CreateSettingRequest, Setting, SettingCategory,
    SettingQuery, SettingStatus,
};

const SETTING_COLUMNS: &str = "id, name, value, setting_type, category, description, \
                               default_value, validation, is_required, is_encrypted, tags, \
                               status, created_by, updated_by, created_at, updated_at";

fn setting_from_row(row: &SqliteRow) -> AppResult<Setting> {
    Ok(Setting {
        id: row.get("id"),
        name: row.get("name"),
        value: json_column(row, "value")?,
        setting_type: enum_column(row, "setting_type")?,
        category: enum_column(row, "category")?,
        description: row.get("description"),
        default_value: optional_json_column(row, "default_value")?,
        validation: row.get("validation"),
        is_required: row.get("is_required"),
        is_encrypted: row.get("is_encrypted"),
        tags: json_column(row, "tags")?,
        status: enum_column(row, "status")?,
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn setting_not_found(name: &str) -> AppError {
    AppError::NotFound(format!("Setting '{}'", name))
}

impl Database {
    /// Insert a validated setting; an existing name is a duplicate
    pub async fn create_setting(
        &self,
        request: &CreateSettingRequest,
        created_by: Option<&str>,
    ) -> AppResult<Setting> {
        let id = new_id();
        let now = now_rfc3339();
        let default_value = request
            .default_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(&format!(
            "INSERT INTO settings ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SETTING_COLUMNS
        ))
        .bind(&id)
        .bind(&request.name)
        .bind(serde_json::to_string(&request.value)?)
        .bind(request.setting_type.as_str())
        .bind(request.category.as_str())
        .bind(request.description.as_deref())
        .bind(default_value)
        .bind(request.validation.as_deref())
        .bind(request.is_required)
        .bind(request.is_encrypted)
        .bind(serde_json::to_string(&request.tags)?)
        .bind(request.status.unwrap_or(SettingStatus::Active).as_str())
        .bind(created_by)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Duplicate(_) => {
                AppError::Duplicate(format!("A setting named '{}' already exists", request.name))
            }
            other => other,
        })?;

        self.require_setting_by_id(&id).await
    }

    pub async fn get_setting_by_id(&self, id: &str) -> AppResult<Option<Setting>> {
        let row = sqlx::query(&format!("SELECT {} FROM settings WHERE id = ?", SETTING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(setting_from_row).transpose()
    }

    pub async fn require_setting_by_id(&self, id: &str) -> AppResult<Setting> {
        self.get_setting_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Setting"))
    }

    /// Active or inactive setting by name; deprecated settings are not returned
    pub async fn get_setting(&self, name: &str) -> AppResult<Option<Setting>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM settings WHERE name = ? AND status != 'deprecated'",
            SETTING_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(setting_from_row).transpose()
    }

    pub async fn require_setting(&self, name: &str) -> AppResult<Setting> {
        self.get_setting(name)
            .await?
            .ok_or_else(|| setting_not_found(name))
    }

    /// Non-deprecated settings of one category, by name
    pub async fn get_settings_by_category(
        &self,
        category: SettingCategory,
    ) -> AppResult<Vec<Setting>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM settings WHERE category = ? AND status != 'deprecated' ORDER BY name",
            SETTING_COLUMNS
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(setting_from_row).collect()
    }

    /// Filtered listing ordered by category then name
    pub async fn list_settings(&self, query: &SettingQuery) -> AppResult<Vec<Setting>> {
        let mut filter = Filter::default();
        if let Some(category) = query.category {
            filter.eq("category", category);
        }
        if let Some(status) = query.status {
            filter.eq("status", status);
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.add("(name LIKE ? OR description LIKE ?)", [like(search), like(search)]);
        }
        if let Some(tag) = query.tag.as_deref().filter(|t| !t.trim().is_empty()) {
            filter.add(
                "EXISTS (SELECT 1 FROM json_each(settings.tags) WHERE json_each.value = ?)",
                [tag.trim().to_string()],
            );
        }

        let sql = format!(
            "SELECT {} FROM settings{} ORDER BY category, name",
            SETTING_COLUMNS,
            filter.sql()
        );
        let rows = filter.bind(sqlx::query(&sql)).fetch_all(&self.pool).await?;

        rows.iter().map(setting_from_row).collect()
    }

    /// Active, non-sensitive settings safe to expose without authentication
    pub async fn list_public_settings(&self) -> AppResult<Vec<Setting>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM settings
             WHERE status = 'active' AND is_encrypted = 0 AND setting_type != 'password'
               AND category IN ('general', 'appointment')
             ORDER BY category, name",
            SETTING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(setting_from_row).collect()
    }

    /// Persist every mutable field of an already-validated setting
    pub async fn save_setting(&self, setting: &Setting, updated_by: Option<&str>) -> AppResult<Setting> {
        let default_value = setting
            .default_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE settings SET
                value = ?, setting_type = ?, category = ?, description = ?, default_value = ?,
                validation = ?, is_required = ?, is_encrypted = ?, tags = ?, status = ?,
                updated_by = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(serde_json::to_string(&setting.value)?)
        .bind(setting.setting_type.as_str())
        .bind(setting.category.as_str())
        .bind(setting.description.as_deref())
        .bind(default_value)
        .bind(setting.validation.as_deref())
        .bind(setting.is_required)
        .bind(setting.is_encrypted)
        .bind(serde_json::to_string(&setting.tags)?)
        .bind(setting.status.as_str())
        .bind(updated_by)
        .bind(now_rfc3339())
        .bind(&setting.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Setting"));
        }
        self.require_setting_by_id(&setting.id).await
    }

    /// Type-check and store a new value for the named setting
    pub async fn set_setting(
        &self,
        name: &str,
        value: Value,
        updated_by: Option<&str>,
    ) -> AppResult<Setting> {
        let mut setting = self.require_setting(name).await?;
        setting.check_value(&value)?;
        setting.value = value;
        self.save_setting(&setting, updated_by).await
    }

    /// Restore the named setting to its default value
    pub async fn reset_setting(&self, name: &str, updated_by: Option<&str>) -> AppResult<Setting> {
        let mut setting = self.require_setting(name).await?;
        let default = setting.default_value.clone().ok_or_else(|| {
            AppError::Validation(format!("setting '{}' has no default value", name))
        })?;
        setting.value = default;
        self.save_setting(&setting, updated_by).await
    }

    /// Soft delete: the setting stays in place with status `deprecated`
    pub async fn deprecate_setting(&self, id: &str, updated_by: Option<&str>) -> AppResult<Setting> {
        let mut setting = self.require_setting_by_id(id).await?;
        setting.status = SettingStatus::Deprecated;
        self.save_setting(&setting, updated_by).await
    }

    /// Typed read of an active setting's value, falling back when it is absent,
    /// inactive, or of the wrong shape
    pub async fn get_setting_value<T: DeserializeOwned>(&self, name: &str, fallback: T) -> T {
        let row = sqlx::query("SELECT value FROM settings WHERE name = ? AND status = 'active'")
            .bind(name)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(Some(row)) => {
                let raw: String = row.get("value");
                match serde_json::from_str(&raw) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(setting = name, error = %e, "Setting value has unexpected shape, using fallback");
                        fallback
                    }
                }
            }
            Ok(None) => fallback,
            Err(e) => {
                tracing::error!(setting = name, error = %e, "Failed to read setting, using fallback");
                fallback
            }
        }
    }

    /// Insert the built-in settings that do not exist yet; returns how many were added
    pub async fn seed_default_settings(&self) -> AppResult<usize> {
        let mut inserted = 0;
        for seed in default_settings() {
            let exists: i64 = sqlx::query("SELECT EXISTS(SELECT 1 FROM settings WHERE name = ?)")
                .bind(&seed.name)
                .fetch_one(&self.pool)
                .await?
                .get(0);
            if exists == 0 {
                self.create_setting(&seed, None).await?;
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
