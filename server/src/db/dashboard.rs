//! Aggregates behind the role dashboards

use sqlx::Row;

use super::appointments::{appointment_from_row, APPOINTMENT_SELECT};
use super::Database;
use crate::error::AppResult;
use crate::models::{
    AdminDashboard, AdminLogQuery, Appointment, AppointmentQuery, DoctorDashboard,
    PatientDashboard, ReviewQuery, ReviewStatus, DASHBOARD_RECENT_LIMIT,
};

impl Database {
    async fn count(&self, sql: &str, binds: &[&str]) -> AppResult<i64> {
        let query = binds
            .iter()
            .fold(sqlx::query(sql), |query, value| query.bind(*value));
        Ok(query.fetch_one(&self.pool).await?.get(0))
    }

    pub async fn admin_dashboard(&self, today: &str) -> AppResult<AdminDashboard> {
        let recent_limit = DASHBOARD_RECENT_LIMIT as u32;
        let recent_appointments = self
            .list_appointments(&AppointmentQuery {
                sort: Some("-created".to_string()),
                limit: Some(recent_limit),
                ..Default::default()
            })
            .await?
            .items;
        let recent_admin_logs = self
            .list_admin_logs(&AdminLogQuery {
                limit: Some(recent_limit),
                ..Default::default()
            })
            .await?
            .items;

        Ok(AdminDashboard {
            users_by_role: self.count_users_by_role().await?,
            pending_doctor_approvals: self.count_pending_doctors().await?,
            appointments_by_status: self.count_appointments_by_status(None, None).await?,
            todays_appointments: self
                .count("SELECT COUNT(*) FROM appointments WHERE date = ?", &[today])
                .await?,
            recent_appointments,
            recent_admin_logs,
        })
    }

    pub async fn doctor_dashboard(&self, doctor_id: &str, today: &str) -> AppResult<DoctorDashboard> {
        let todays_appointments = self.doctor_day_schedule(doctor_id, today).await?;
        let counts = self
            .count_appointments_by_status(Some(doctor_id), None)
            .await?;
        let recent_reviews = self
            .list_reviews(&ReviewQuery {
                status: Some(ReviewStatus::Visible),
                doctor_id: Some(doctor_id.to_string()),
                limit: Some(DASHBOARD_RECENT_LIMIT as u32),
                ..Default::default()
            })
            .await?
            .items;

        Ok(DoctorDashboard {
            todays_appointments,
            pending_requests: counts.get("pending").copied().unwrap_or(0),
            upcoming_count: self
                .count(
                    "SELECT COUNT(*) FROM appointments
                     WHERE doctor_id = ? AND date >= ? AND status IN ('pending', 'confirmed')",
                    &[doctor_id, today],
                )
                .await?,
            completed_count: counts.get("completed").copied().unwrap_or(0),
            total_patients: self
                .count(
                    "SELECT COUNT(DISTINCT patient_id) FROM appointments WHERE doctor_id = ?",
                    &[doctor_id],
                )
                .await?,
            rating: self.rating_summary(doctor_id).await?,
            recent_reviews,
        })
    }

    pub async fn patient_dashboard(
        &self,
        patient_id: &str,
        today: &str,
    ) -> AppResult<PatientDashboard> {
        let sql = format!(
            "{} WHERE a.patient_id = ? AND a.date >= ? AND a.status IN ('pending', 'confirmed')
             ORDER BY a.date ASC, a.start_time ASC LIMIT ?",
            APPOINTMENT_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(patient_id)
            .bind(today)
            .bind(DASHBOARD_RECENT_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        let upcoming_appointments = rows
            .iter()
            .map(appointment_from_row)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PatientDashboard {
            upcoming_appointments,
            completed_count: self
                .count(
                    "SELECT COUNT(*) FROM appointments WHERE patient_id = ? AND status = 'completed'",
                    &[patient_id],
                )
                .await?,
            prescriptions_count: self.count_prescriptions_for_patient(patient_id).await?,
            reports_count: self.count_reports_for_patient(patient_id).await?,
            unread_notifications: self.count_unread_notifications(patient_id).await?,
        })
    }

    /// The doctor's non-cancelled appointments on `date`, in time order
    async fn doctor_day_schedule(&self, doctor_id: &str, date: &str) -> AppResult<Vec<Appointment>> {
        let sql = format!(
            "{} WHERE a.doctor_id = ? AND a.date = ? AND a.status NOT IN ('cancelled', 'rejected')
             ORDER BY a.start_time ASC",
            APPOINTMENT_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(doctor_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(appointment_from_row).collect()
    }
}
