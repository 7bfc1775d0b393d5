use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    new_id, now_rfc3339, Appointment, CreateReviewRequest, PageParams, Paginated,
    RatingSummary, Review, ReviewQuery, ReviewStatus,
};

const REVIEW_SELECT: &str = r#"
    SELECT rv.id, rv.appointment_id, rv.doctor_id, d.name AS doctor_name,
           rv.patient_id, p.name AS patient_name, rv.rating, rv.comment, rv.status,
           rv.created_at, rv.updated_at
    FROM reviews rv
    JOIN users d ON d.id = rv.doctor_id
    JOIN users p ON p.id = rv.patient_id
"#;

fn review_from_row(row: &SqliteRow) -> AppResult<Review> {
    Ok(Review {
        id: row.get("id"),
        appointment_id: row.get("appointment_id"),
        doctor_id: row.get("doctor_id"),
        doctor_name: row.get("doctor_name"),
        patient_id: row.get("patient_id"),
        patient_name: row.get("patient_name"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        status: enum_column(row, "status")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl Database {
    /// One review per appointment; a second attempt is a duplicate
    pub async fn create_review(
        &self,
        appointment: &Appointment,
        request: &CreateReviewRequest,
    ) -> AppResult<Review> {
        let id = new_id();
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO reviews
                (id, appointment_id, doctor_id, patient_id, rating, comment, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&appointment.id)
        .bind(&appointment.doctor_id)
        .bind(&appointment.patient_id)
        .bind(request.rating)
        .bind(request.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()))
        .bind(ReviewStatus::Visible.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Duplicate(_) => {
                AppError::Duplicate("This appointment has already been reviewed".to_string())
            }
            other => other,
        })?;

        self.require_review(&id).await
    }

    pub async fn get_review(&self, id: &str) -> AppResult<Option<Review>> {
        let sql = format!("{} WHERE rv.id = ?", REVIEW_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(review_from_row).transpose()
    }

    pub async fn require_review(&self, id: &str) -> AppResult<Review> {
        self.get_review(id)
            .await?
            .ok_or_else(|| AppError::not_found("Review"))
    }

    /// Newest first
    pub async fn list_reviews(&self, query: &ReviewQuery) -> AppResult<Paginated<Review>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        if let Some(status) = query.status {
            filter.eq("rv.status", status);
        }
        if let Some(doctor_id) = &query.doctor_id {
            filter.eq("rv.doctor_id", doctor_id);
        }

        let count_sql = format!("SELECT COUNT(*) FROM reviews rv{}", filter.sql());
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "{}{} ORDER BY rv.created_at DESC LIMIT ? OFFSET ?",
            REVIEW_SELECT,
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
            .map(review_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    pub async fn list_reviews_by_patient(&self, patient_id: &str) -> AppResult<Vec<Review>> {
        let sql = format!(
            "{} WHERE rv.patient_id = ? ORDER BY rv.created_at DESC",
            REVIEW_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(review_from_row).collect()
    }

    pub async fn update_review_status(&self, id: &str, status: ReviewStatus) -> AppResult<Review> {
        let result = sqlx::query("UPDATE reviews SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Review"));
        }
        self.require_review(id).await
    }

    /// Average and count over visible reviews; zero when there are none
    pub async fn rating_summary(&self, doctor_id: &str) -> AppResult<RatingSummary> {
        let row = sqlx::query(
            "SELECT COALESCE(AVG(rating), 0.0) AS average, COUNT(*) AS total
             FROM reviews WHERE doctor_id = ? AND status = 'visible'",
        )
        .bind(doctor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingSummary {
            average: row.get("average"),
            count: row.get("total"),
        })
    }
}
