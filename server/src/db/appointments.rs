use std::collections::BTreeMap;

use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    new_id, now_rfc3339, Appointment, AppointmentQuery, AppointmentStatus, NewAppointment,
    PageParams, Paginated,
};

pub(crate) const APPOINTMENT_SELECT: &str = r#"
    SELECT a.id, a.patient_id, p.name AS patient_name, a.doctor_id, d.name AS doctor_name,
           dp.specialization AS doctor_specialization,
           a.date, a.start_time, a.end_time, a.appointment_type, a.reason, a.status,
           a.notes, a.cancel_reason, a.created_at, a.updated_at
    FROM appointments a
    JOIN users p ON p.id = a.patient_id
    JOIN users d ON d.id = a.doctor_id
    LEFT JOIN doctor_profiles dp ON dp.user_id = a.doctor_id
"#;

pub(crate) fn appointment_from_row(row: &SqliteRow) -> AppResult<Appointment> {
    Ok(Appointment {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        patient_name: row.get("patient_name"),
        doctor_id: row.get("doctor_id"),
        doctor_name: row.get("doctor_name"),
        doctor_specialization: row.get("doctor_specialization"),
        date: row.get("date"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        appointment_type: enum_column(row, "appointment_type")?,
        reason: row.get("reason"),
        status: enum_column(row, "status")?,
        notes: row.get("notes"),
        cancel_reason: row.get("cancel_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn appointment_sort(sort: Option<&str>) -> &'static str {
    match sort {
        Some("-date") => "a.date DESC, a.start_time DESC",
        Some("created") => "a.created_at ASC",
        Some("-created") => "a.created_at DESC",
        _ => "a.date ASC, a.start_time ASC",
    }
}

impl Database {
    /// Store a pending appointment; a concurrent booking of the same slot is a duplicate
    pub async fn create_appointment(&self, new: &NewAppointment) -> AppResult<Appointment> {
        let id = new_id();
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO appointments
                (id, patient_id, doctor_id, date, start_time, end_time, appointment_type, reason,
                 status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.patient_id)
        .bind(&new.doctor_id)
        .bind(&new.date)
        .bind(&new.start_time)
        .bind(&new.end_time)
        .bind(new.appointment_type.as_str())
        .bind(new.reason.as_deref())
        .bind(AppointmentStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(slot_conflict)?;

        self.require_appointment(&id).await
    }

    pub async fn get_appointment(&self, id: &str) -> AppResult<Option<Appointment>> {
        let sql = format!("{} WHERE a.id = ?", APPOINTMENT_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(appointment_from_row).transpose()
    }

    pub async fn require_appointment(&self, id: &str) -> AppResult<Appointment> {
        self.get_appointment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Appointment"))
    }

    /// Filtered listing; callers scope by participant through `doctor_id`/`patient_id`
    pub async fn list_appointments(
        &self,
        query: &AppointmentQuery,
    ) -> AppResult<Paginated<Appointment>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        if let Some(status) = query.status {
            filter.eq("a.status", status);
        }
        if let Some(doctor_id) = &query.doctor_id {
            filter.eq("a.doctor_id", doctor_id);
        }
        if let Some(patient_id) = &query.patient_id {
            filter.eq("a.patient_id", patient_id);
        }
        if let Some(from) = &query.from {
            filter.add("a.date >= ?", [from.clone()]);
        }
        if let Some(to) = &query.to {
            filter.add("a.date <= ?", [to.clone()]);
        }

        let count_sql = format!("SELECT COUNT(*) FROM appointments a{}", filter.sql());
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "{}{} ORDER BY {} LIMIT ? OFFSET ?",
            APPOINTMENT_SELECT,
            filter.sql(),
            appointment_sort(query.sort.as_deref())
        );
        let rows = filter
            .bind(sqlx::query(&sql))
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(appointment_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    /// Start/end times of the doctor's active appointments on `date`
    pub async fn booked_slots(
        &self,
        doctor_id: &str,
        date: &str,
        exclude_id: Option<&str>,
    ) -> AppResult<Vec<(String, String)>> {
        let rows = sqlx::query(
            "SELECT start_time, end_time FROM appointments
             WHERE doctor_id = ? AND date = ? AND status IN ('pending', 'confirmed')
               AND id != COALESCE(?, '')
             ORDER BY start_time",
        )
        .bind(doctor_id)
        .bind(date)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("start_time"), row.get("end_time")))
            .collect())
    }

    /// Apply a status change, provided the appointment is still in `expected`
    pub async fn update_appointment_status(
        &self,
        id: &str,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        notes: Option<&str>,
        cancel_reason: Option<&str>,
    ) -> AppResult<Appointment> {
        let result = sqlx::query(
            "UPDATE appointments SET
                status = ?,
                notes = COALESCE(?, notes),
                cancel_reason = COALESCE(?, cancel_reason),
                updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(cancel_reason)
        .bind(now_rfc3339())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(slot_conflict)?;

        if result.rows_affected() == 0 {
            return Err(self.stale_status(id, expected).await);
        }
        self.require_appointment(id).await
    }

    /// Move an appointment to a new slot; it goes back to pending for the doctor to confirm.
    /// Fails when the status is no longer `expected`.
    pub async fn reschedule_appointment(
        &self,
        id: &str,
        expected: AppointmentStatus,
        date: &str,
        start_time: &str,
        end_time: &str,
    ) -> AppResult<Appointment> {
        let result = sqlx::query(
            "UPDATE appointments SET date = ?, start_time = ?, end_time = ?, status = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(date)
        .bind(start_time)
        .bind(end_time)
        .bind(AppointmentStatus::Pending.as_str())
        .bind(now_rfc3339())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(slot_conflict)?;

        if result.rows_affected() == 0 {
            return Err(self.stale_status(id, expected).await);
        }
        self.require_appointment(id).await
    }

    /// Error for an update that matched no row: missing, or changed by someone else
    async fn stale_status(&self, id: &str, expected: AppointmentStatus) -> AppError {
        match self.require_appointment(id).await {
            Ok(current) => AppError::Validation(format!(
                "appointment is now {}, not {}; reload and try again",
                current.status, expected
            )),
            Err(e) => e,
        }
    }

    /// Whether the doctor and patient share at least one appointment, in any status
    pub async fn has_shared_appointment(&self, doctor_id: &str, patient_id: &str) -> AppResult<bool> {
        let found: i64 = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM appointments WHERE doctor_id = ? AND patient_id = ?)",
        )
        .bind(doctor_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?
        .get(0);
        Ok(found != 0)
    }

    pub async fn count_appointments_by_status(
        &self,
        doctor_id: Option<&str>,
        patient_id: Option<&str>,
    ) -> AppResult<BTreeMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total FROM appointments
             WHERE (? IS NULL OR doctor_id = ?) AND (? IS NULL OR patient_id = ?)
             GROUP BY status",
        )
        .bind(doctor_id)
        .bind(doctor_id)
        .bind(patient_id)
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: BTreeMap<String, i64> = AppointmentStatus::ALL
            .iter()
            .map(|status| (status.to_string(), 0))
            .collect();
        for row in rows {
            counts.insert(row.get("status"), row.get("total"));
        }
        Ok(counts)
    }
}

/// The active-slot index reports a taken slot as a unique violation
fn slot_conflict(err: sqlx::Error) -> AppError {
    match AppError::from(err) {
        AppError::Duplicate(_) => {
            AppError::Duplicate("The doctor already has an appointment in this slot".to_string())
        }
        other => other,
    }
}
