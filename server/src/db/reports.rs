use sqlx::{sqlite::SqliteRow, Row};

use super::{enum_column, Database, Filter};
use crate::error::{AppError, AppResult};
use crate::models::{
    new_id, now_rfc3339, MedicalReport, NewReport, PageParams, Paginated, ReportFile,
    ReportQuery,
};

const REPORT_SELECT: &str = r#"
    SELECT r.id, r.patient_id, p.name AS patient_name, r.uploaded_by,
           u.name AS uploaded_by_name, r.appointment_id, r.title, r.report_type,
           r.description, r.file_name, r.content_type, r.file_size, r.created_at
    FROM medical_reports r
    JOIN users p ON p.id = r.patient_id
    JOIN users u ON u.id = r.uploaded_by
"#;

fn report_from_row(row: &SqliteRow) -> AppResult<MedicalReport> {
    Ok(MedicalReport {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        patient_name: row.get("patient_name"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_by_name: row.get("uploaded_by_name"),
        appointment_id: row.get("appointment_id"),
        title: row.get("title"),
        report_type: enum_column(row, "report_type")?,
        description: row.get("description"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        file_size: row.get("file_size"),
        created_at: row.get("created_at"),
    })
}

impl Database {
    pub async fn create_report(&self, report: NewReport) -> AppResult<MedicalReport> {
        let id = new_id();
        let (file_name, content_type, data) = match report.file {
            Some(file) => (Some(file.file_name), Some(file.content_type), Some(file.data)),
            None => (None, None, None),
        };
        let file_size = data.as_ref().map(|d| d.len() as i64).unwrap_or(0);

        sqlx::query(
            "INSERT INTO medical_reports
                (id, patient_id, uploaded_by, appointment_id, title, report_type, description,
                 file_name, content_type, file_size, file_data, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&report.patient_id)
        .bind(&report.uploaded_by)
        .bind(report.appointment_id.as_deref())
        .bind(report.title.trim())
        .bind(report.report_type.as_str())
        .bind(report.description.as_deref())
        .bind(file_name)
        .bind(content_type)
        .bind(file_size)
        .bind(data)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        self.require_report(&id).await
    }

    pub async fn get_report(&self, id: &str) -> AppResult<Option<MedicalReport>> {
        let sql = format!("{} WHERE r.id = ?", REPORT_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(report_from_row).transpose()
    }

    pub async fn require_report(&self, id: &str) -> AppResult<MedicalReport> {
        self.get_report(id)
            .await?
            .ok_or_else(|| AppError::not_found("Report"))
    }

    /// Newest first. `doctor_id` limits results to reports the doctor uploaded or that
    /// belong to their patients.
    pub async fn list_reports(
        &self,
        query: &ReportQuery,
        doctor_id: Option<&str>,
    ) -> AppResult<Paginated<MedicalReport>> {
        let params = PageParams::new(query.page, query.limit);
        let mut filter = Filter::default();
        if let Some(patient_id) = &query.patient_id {
            filter.eq("r.patient_id", patient_id);
        }
        if let Some(report_type) = query.report_type {
            filter.eq("r.report_type", report_type);
        }
        if let Some(doctor_id) = doctor_id {
            filter.add(
                "(r.uploaded_by = ? OR r.patient_id IN
                    (SELECT patient_id FROM appointments WHERE doctor_id = ?))",
                [doctor_id.to_string(), doctor_id.to_string()],
            );
        }

        let count_sql = format!("SELECT COUNT(*) FROM medical_reports r{}", filter.sql());
        let total: i64 = filter
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await?
            .get(0);

        let sql = format!(
            "{}{} ORDER BY r.created_at DESC LIMIT ? OFFSET ?",
            REPORT_SELECT,
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
            .map(report_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Paginated::new(items, total, params))
    }

    /// Stored attachment, or `None` when the report has no file
    pub async fn get_report_file(&self, id: &str) -> AppResult<Option<ReportFile>> {
        let row = sqlx::query(
            "SELECT file_name, content_type, file_data FROM medical_reports
             WHERE id = ? AND file_data IS NOT NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ReportFile {
            file_name: row
                .get::<Option<String>, _>("file_name")
                .unwrap_or_else(|| "report".to_string()),
            content_type: row
                .get::<Option<String>, _>("content_type")
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            data: row.get("file_data"),
        }))
    }

    pub async fn delete_report(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM medical_reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_reports_for_patient(&self, patient_id: &str) -> AppResult<i64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM medical_reports WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_one(&self.pool)
            .await?
            .get(0);
        Ok(total)
    }
}
