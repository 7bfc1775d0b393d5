use sqlx::{sqlite::SqliteRow, Row};

use super::{json_column, optional_json_column, Database};
use crate::error::{AppError, AppResult};
use crate::models::{
    now_rfc3339, Gender, PatientProfile, PatientSummary, UpdatePatientProfileRequest,
};

const PATIENT_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.phone,
           p.user_id, p.date_of_birth, p.gender, p.blood_group, p.address, p.allergies,
           p.medical_history, p.emergency_contact, p.updated_at
    FROM users u
    JOIN patient_profiles p ON p.user_id = u.id
"#;

fn profile_from_row(row: &SqliteRow) -> AppResult<PatientProfile> {
    let gender: Option<String> = row.get("gender");
    Ok(PatientProfile {
        user_id: row.get("user_id"),
        date_of_birth: row.get("date_of_birth"),
        gender: gender.map(|g| g.parse::<Gender>()).transpose()?,
        blood_group: row.get("blood_group"),
        address: row.get("address"),
        allergies: json_column(row, "allergies")?,
        medical_history: row.get("medical_history"),
        emergency_contact: optional_json_column(row, "emergency_contact")?,
        updated_at: row.get("updated_at"),
    })
}

fn patient_from_row(row: &SqliteRow) -> AppResult<PatientSummary> {
    Ok(PatientSummary {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        profile: profile_from_row(row)?,
    })
}

impl Database {
    pub async fn get_patient(&self, id: &str) -> AppResult<Option<PatientSummary>> {
        let sql = format!("{} WHERE u.id = ?", PATIENT_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    pub async fn require_patient(&self, id: &str) -> AppResult<PatientSummary> {
        self.get_patient(id)
            .await?
            .ok_or_else(|| AppError::not_found("Patient"))
    }

    pub async fn update_patient_profile(
        &self,
        user_id: &str,
        update: &UpdatePatientProfileRequest,
    ) -> AppResult<PatientSummary> {
        let allergies = update
            .allergies
            .as_ref()
            .map(|list| {
                let cleaned: Vec<&str> = list
                    .iter()
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty())
                    .collect();
                serde_json::to_string(&cleaned)
            })
            .transpose()?;
        let emergency_contact = update
            .emergency_contact
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE patient_profiles SET
                date_of_birth = COALESCE(?, date_of_birth),
                gender = COALESCE(?, gender),
                blood_group = COALESCE(?, blood_group),
                address = COALESCE(?, address),
                allergies = COALESCE(?, allergies),
                medical_history = COALESCE(?, medical_history),
                emergency_contact = COALESCE(?, emergency_contact),
                updated_at = ?
             WHERE user_id = ?",
        )
        .bind(update.date_of_birth.as_deref())
        .bind(update.gender.map(|g| g.as_str()))
        .bind(update.blood_group.as_deref())
        .bind(update.address.as_deref())
        .bind(allergies)
        .bind(update.medical_history.as_deref())
        .bind(emergency_contact)
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Patient profile"));
        }

        if update.name.is_some() || update.phone.is_some() {
            self.update_user_contact(user_id, update.name.as_deref(), update.phone.as_deref())
                .await?;
        }

        self.require_patient(user_id).await
    }

    /// Patients with at least one appointment with the doctor, by name
    pub async fn list_doctor_patients(&self, doctor_id: &str) -> AppResult<Vec<PatientSummary>> {
        let sql = format!(
            "{} WHERE u.id IN (SELECT patient_id FROM appointments WHERE doctor_id = ?)
             ORDER BY u.name ASC",
            PATIENT_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(doctor_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(patient_from_row).collect()
    }
}
