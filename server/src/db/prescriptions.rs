use sqlx::{sqlite::SqliteRow, Row};

use super::{json_column, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    new_id, now_rfc3339, Appointment, CreatePrescriptionRequest, PageParams, Paginated,
    Prescription, PrescriptionQuery, UpdatePrescriptionRequest,
};

const PRESCRIPTION_SELECT: &str = r#"
    SELECT rx.id, rx.appointment_id, rx.doctor_id, d.name AS doctor_name,
           rx.patient_id, p.name AS patient_name, rx.diagnosis, rx.medications, rx.notes,
           rx.follow_up_date, rx.created_at, rx.updated_at
    FROM prescriptions rx
    JOIN users d ON d.id = rx.doctor_id
    JOIN users p ON p.id = rx.patient_id
"#;

fn prescription_from_row(row: &SqliteRow) -> AppResult<Prescription> {
    Ok(Prescription {
        id: row.get("id"),
        appointment_id: row.get("appointment_id"),
        doctor_id: row.get("doctor_id"),
        doctor_name: row.get("doctor_name"),
        patient_id: row.get("patient_id"),
        patient_name: row.get("patient_name"),
        diagnosis: row.get("diagnosis"),
        medications: json_column(row, "medications")?,
        notes: row.get("notes"),
        follow_up_date: row.get("follow_up_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl Database {
    /// Issue a prescription against `appointment`, copying its participants
    pub async fn create_prescription(
        &self,
        appointment: &Appointment,
        request: &CreatePrescriptionRequest,
    ) -> AppResult<Prescription> {
        let id = new_id();
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO prescriptions
                (id, appointment_id, doctor_id, patient_id, diagnosis, medications, notes,
                 follow_up_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&appointment.id)
        .bind(&appointment.doctor_id)
        .bind(&appointment.patient_id)
        .bind(request.diagnosis.trim())
        .bind(serde_json::to_string(&request.medications)?)
        .bind(request.notes.as_deref())
        .bind(request.follow_up_date.as_deref())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.require_prescription(&id).await
    }

    pub async fn get_prescription(&self, id: &str) -> AppResult<Option<Prescription>> {
        let sql = format!("{} WHERE rx.id = ?", PRESCRIPTION_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(prescription_from_row).transpose()
    }

    pub async fn require_prescription(&self, id: &str) -> AppResult<Prescription> {
        self.get_prescription(id)
            .await?
            .ok_or_else(|| AppError::not_found("Prescription"))
    }

    /// Newest first; `doctor_id` restricts to prescriptions the doctor issued
    pub async fn list_prescriptions(
        &self,
        query: &PrescriptionQuery,
        doctor_id: Option<&str>,
    ) -> AppResult<Paginated<Prescription>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        if let Some(patient_id) = &query.patient_id {
            filter.eq("rx.patient_id", patient_id);
        }
        if let Some(appointment_id) = &query.appointment_id {
            filter.eq("rx.appointment_id", appointment_id);
        }
        if let Some(doctor_id) = doctor_id {
            filter.eq("rx.doctor_id", doctor_id);
        }

        let count_sql = format!("SELECT COUNT(*) FROM prescriptions rx{}", filter.sql());
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "{}{} ORDER BY rx.created_at DESC LIMIT ? OFFSET ?",
            PRESCRIPTION_SELECT,
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
            .map(prescription_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    pub async fn update_prescription(
        &self,
        id: &str,
        update: &UpdatePrescriptionRequest,
    ) -> AppResult<Prescription> {
        let medications = update
            .medications
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE prescriptions SET
                diagnosis = COALESCE(?, diagnosis),
                medications = COALESCE(?, medications),
                notes = COALESCE(?, notes),
                follow_up_date = COALESCE(?, follow_up_date),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(update.diagnosis.as_deref().map(str::trim))
        .bind(medications)
        .bind(update.notes.as_deref())
        .bind(update.follow_up_date.as_deref())
        .bind(now_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Prescription"));
        }
        self.require_prescription(id).await
    }

    pub async fn count_prescriptions_for_patient(&self, patient_id: &str) -> AppResult<i64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM prescriptions WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_one(&self.pool)
            .await?
            .get(0);
        Ok(total)
    }
}
