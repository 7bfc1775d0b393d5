use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, json_column, like, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    now_rfc3339, ApprovalStatus, DoctorProfile, DoctorQuery, DoctorSummary, PageParams,
    Paginated, Role, UpdateDoctorProfileRequest, UserStatus,
};

/// Doctor account joined with its profile and visible-review rating
const DOCTOR_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.phone, u.status,
           d.specialization, d.qualifications, d.experience_years, d.consultation_fee,
           d.bio, d.hospital, d.availability, d.approval_status,
           COALESCE(r.average, 0.0) AS rating_average,
           COALESCE(r.total, 0) AS rating_count
    FROM users u
    JOIN doctor_profiles d ON d.user_id = u.id
    LEFT JOIN (
        SELECT doctor_id, AVG(rating) AS average, COUNT(*) AS total
        FROM reviews WHERE status = 'visible'
        GROUP BY doctor_id
    ) r ON r.doctor_id = u.id
"#;

fn doctor_from_row(row: &SqliteRow) -> AppResult<DoctorSummary> {
    Ok(DoctorSummary {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        status: enum_column(row, "status")?,
        specialization: row.get("specialization"),
        qualifications: row.get("qualifications"),
        experience_years: row.get("experience_years"),
        consultation_fee: row.get("consultation_fee"),
        bio: row.get("bio"),
        hospital: row.get("hospital"),
        availability: json_column(row, "availability")?,
        approval_status: enum_column(row, "approval_status")?,
        rating_average: row.get("rating_average"),
        rating_count: row.get("rating_count"),
    })
}

fn doctor_sort(sort: Option<&str>) -> &'static str {
    match sort {
        Some("fee") => "d.consultation_fee ASC, u.name ASC",
        Some("-fee") => "d.consultation_fee DESC, u.name ASC",
        Some("experience") => "d.experience_years DESC, u.name ASC",
        Some("name") => "u.name ASC",
        _ => "rating_average DESC, rating_count DESC, u.name ASC",
    }
}

impl Database {
    pub async fn get_doctor_profile(&self, user_id: &str) -> AppResult<Option<DoctorProfile>> {
        let row = sqlx::query(
            "SELECT user_id, specialization, qualifications, experience_years, consultation_fee,
                    bio, hospital, availability, approval_status, updated_at
             FROM doctor_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(DoctorProfile {
                user_id: row.get("user_id"),
                specialization: row.get("specialization"),
                qualifications: row.get("qualifications"),
                experience_years: row.get("experience_years"),
                consultation_fee: row.get("consultation_fee"),
                bio: row.get("bio"),
                hospital: row.get("hospital"),
                availability: json_column(&row, "availability")?,
                approval_status: enum_column(&row, "approval_status")?,
                updated_at: row.get("updated_at"),
            })
        })
        .transpose()
    }

    pub async fn get_doctor(&self, id: &str) -> AppResult<Option<DoctorSummary>> {
        let sql = format!("{} WHERE u.id = ? AND u.role = 'doctor'", DOCTOR_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(doctor_from_row).transpose()
    }

    pub async fn require_doctor(&self, id: &str) -> AppResult<DoctorSummary> {
        self.get_doctor(id)
            .await?
            .ok_or_else(|| AppError::not_found("Doctor"))
    }

    /// Directory listing; `public_only` restricts to approved, active doctors
    pub async fn list_doctors(
        &self,
        query: &DoctorQuery,
        public_only: bool,
    ) -> AppResult<Paginated<DoctorSummary>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        filter.eq("u.role", Role::Doctor);
        if public_only {
            filter.eq("d.approval_status", ApprovalStatus::Approved);
            filter.eq("u.status", UserStatus::Active);
        }
        if let Some(specialization) = query
            .specialization
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            filter.add(
                "d.specialization = ? COLLATE NOCASE",
                [specialization.trim().to_string()],
            );
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.add(
                "(u.name LIKE ? OR d.specialization LIKE ? OR d.hospital LIKE ?)",
                [like(search), like(search), like(search)],
            );
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM users u JOIN doctor_profiles d ON d.user_id = u.id{}",
            filter.sql()
        );
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "{}{} ORDER BY {} LIMIT ? OFFSET ?",
            DOCTOR_SELECT,
            filter.sql(),
            doctor_sort(query.sort.as_deref())
        );
        let rows = filter
            .bind(sqlx::query(&sql))
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(doctor_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    /// Apply a partial profile update; contact fields go to the user row
    pub async fn update_doctor_profile(
        &self,
        user_id: &str,
        update: &UpdateDoctorProfileRequest,
    ) -> AppResult<DoctorSummary> {
        let availability = update
            .availability
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE doctor_profiles SET
                specialization = COALESCE(?, specialization),
                qualifications = COALESCE(?, qualifications),
                experience_years = COALESCE(?, experience_years),
                consultation_fee = COALESCE(?, consultation_fee),
                bio = COALESCE(?, bio),
                hospital = COALESCE(?, hospital),
                availability = COALESCE(?, availability),
                updated_at = ?
             WHERE user_id = ?",
        )
        .bind(update.specialization.as_deref().map(str::trim))
        .bind(update.qualifications.as_deref())
        .bind(update.experience_years)
        .bind(update.consultation_fee)
        .bind(update.bio.as_deref())
        .bind(update.hospital.as_deref())
        .bind(availability)
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Doctor profile"));
        }

        if update.name.is_some() || update.phone.is_some() {
            self.update_user_contact(user_id, update.name.as_deref(), update.phone.as_deref())
                .await?;
        }

        self.require_doctor(user_id).await
    }

    /// Record an approval decision and move the account to the matching status
    pub async fn set_doctor_approval(
        &self,
        user_id: &str,
        approval: ApprovalStatus,
    ) -> AppResult<DoctorSummary> {
        let account_status = match approval {
            ApprovalStatus::Approved => UserStatus::Active,
            ApprovalStatus::Rejected => UserStatus::Rejected,
            ApprovalStatus::Pending => UserStatus::Pending,
        };
        let now = now_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE doctor_profiles SET approval_status = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(approval.as_str())
        .bind(&now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Doctor"));
        }

        sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(account_status.as_str())
            .bind(&now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.require_doctor(user_id).await
    }

    pub async fn count_pending_doctors(&self) -> AppResult<i64> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) FROM doctor_profiles WHERE approval_status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?
        .get(0);
        Ok(total)
    }
}
