//! SQLite persistence
//!
//! One [`Database`] facade; each resource adds its operations in its own file. Nested
//! documents (availability, medications, setting values, log details) live in JSON text
//! columns.

use std::str::FromStr;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite,
};

use crate::error::{AppError, AppResult};

mod admin_logs;
mod appointments;
mod chat;
mod dashboard;
mod doctors;
mod notifications;
mod patients;
mod prescriptions;
mod reports;
mod reviews;
mod settings;
mod users;

#[cfg(test)]
mod tests;

pub struct Database {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL,
        phone TEXT,
        role TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        last_login_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doctor_profiles (
        user_id TEXT PRIMARY KEY,
        specialization TEXT NOT NULL DEFAULT '',
        qualifications TEXT NOT NULL DEFAULT '',
        experience_years INTEGER NOT NULL DEFAULT 0,
        consultation_fee REAL NOT NULL DEFAULT 0,
        bio TEXT,
        hospital TEXT,
        availability TEXT NOT NULL DEFAULT '[]',
        approval_status TEXT NOT NULL DEFAULT 'pending',
        updated_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS patient_profiles (
        user_id TEXT PRIMARY KEY,
        date_of_birth TEXT,
        gender TEXT,
        blood_group TEXT,
        address TEXT,
        allergies TEXT NOT NULL DEFAULT '[]',
        medical_history TEXT,
        emergency_contact TEXT,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL,
        doctor_id TEXT NOT NULL,
        date TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        appointment_type TEXT NOT NULL,
        reason TEXT,
        status TEXT NOT NULL,
        notes TEXT,
        cancel_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    // At most one active booking per doctor slot
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_active_slot
    ON appointments(doctor_id, date, start_time)
    WHERE status IN ('pending', 'confirmed')
    "#,
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id, date)",
    r#"
    CREATE TABLE IF NOT EXISTS prescriptions (
        id TEXT PRIMARY KEY,
        appointment_id TEXT NOT NULL,
        doctor_id TEXT NOT NULL,
        patient_id TEXT NOT NULL,
        diagnosis TEXT NOT NULL,
        medications TEXT NOT NULL DEFAULT '[]',
        notes TEXT,
        follow_up_date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (appointment_id) REFERENCES appointments(id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (patient_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id)",
    r#"
    CREATE TABLE IF NOT EXISTS medical_reports (
        id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL,
        uploaded_by TEXT NOT NULL,
        appointment_id TEXT,
        title TEXT NOT NULL,
        report_type TEXT NOT NULL,
        description TEXT,
        file_name TEXT,
        content_type TEXT,
        file_size INTEGER NOT NULL DEFAULT 0,
        file_data BLOB,
        created_at TEXT NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (uploaded_by) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (appointment_id) REFERENCES appointments(id) ON DELETE SET NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_medical_reports_patient ON medical_reports(patient_id)",
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id TEXT PRIMARY KEY,
        appointment_id TEXT NOT NULL UNIQUE,
        doctor_id TEXT NOT NULL,
        patient_id TEXT NOT NULL,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment TEXT,
        status TEXT NOT NULL DEFAULT 'visible',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (appointment_id) REFERENCES appointments(id) ON DELETE CASCADE,
        FOREIGN KEY (doctor_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (patient_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_reviews_doctor ON reviews(doctor_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        link TEXT,
        is_read BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)",
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        body TEXT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_pair ON chat_messages(sender_id, recipient_id)",
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        value TEXT NOT NULL,
        setting_type TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT,
        default_value TEXT,
        validation TEXT,
        is_required BOOLEAN NOT NULL DEFAULT 0,
        is_encrypted BOOLEAN NOT NULL DEFAULT 0,
        tags TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL DEFAULT 'active',
        created_by TEXT,
        updated_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_settings_category ON settings(category, status)",
    // No foreign key: audit entries outlive the admin account
    r#"
    CREATE TABLE IF NOT EXISTS admin_logs (
        id TEXT PRIMARY KEY,
        admin_id TEXT NOT NULL,
        action TEXT NOT NULL,
        target_table TEXT NOT NULL,
        target_id TEXT,
        details TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_admin_logs_created ON admin_logs(created_at)",
];

impl Database {
    /// Open the database and create any missing tables and indexes
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is its own database, so keep exactly one alive
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            SqlitePoolOptions::new().connect_with(options).await
        }
        .with_context(|| format!("Failed to open database {}", database_url))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("Failed to apply database schema")?;
        }

        Ok(Self { pool })
    }
}

/// WHERE-clause builder for list endpoints; every value is bound, never interpolated
#[derive(Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    binds: Vec<String>,
}

impl Filter {
    pub(crate) fn add(&mut self, clause: &str, values: impl IntoIterator<Item = String>) {
        self.clauses.push(clause.to_string());
        self.binds.extend(values);
    }

    pub(crate) fn eq(&mut self, column: &str, value: impl ToString) {
        self.add(&format!("{} = ?", column), [value.to_string()]);
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        self.binds
            .iter()
            .fold(query, |query, value| query.bind(value.as_str()))
    }
}

/// `%term%` pattern for LIKE searches
pub(crate) fn like(term: &str) -> String {
    format!("%{}%", term.trim())
}

/// Read a text column holding a `string_enum!` value
pub(crate) fn enum_column<T>(row: &SqliteRow, column: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "column {} holds unknown value '{}'",
            column,
            raw
        ))
    })
}

/// Read a JSON text column
pub(crate) fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> AppResult<T> {
    let raw: String = row.try_get(column)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Read a nullable JSON text column
pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> AppResult<Option<T>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(AppError::from)
}
