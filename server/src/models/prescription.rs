use serde::{Deserialize, Serialize};

use super::{parse_date, require_text};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Medication {
    fn validate(&self, index: usize) -> AppResult<()> {
        for (value, field) in [
            (&self.name, "name"),
            (&self.dosage, "dosage"),
            (&self.frequency, "frequency"),
            (&self.duration, "duration"),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "medications[{}].{} is required",
                    index, field
                )));
            }
        }
        Ok(())
    }
}

fn validate_medications(medications: &[Medication]) -> AppResult<()> {
    if medications.is_empty() {
        return Err(AppError::validation("at least one medication is required"));
    }
    medications
        .iter()
        .enumerate()
        .try_for_each(|(i, m)| m.validate(i))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub appointment_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub patient_id: String,
    pub patient_name: String,
    pub diagnosis: String,
    pub medications: Vec<Medication>,
    pub notes: Option<String>,
    pub follow_up_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub appointment_id: String,
    pub diagnosis: String,
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub follow_up_date: Option<String>,
}

impl CreatePrescriptionRequest {
    pub fn validate(&self) -> AppResult<()> {
        require_text(&self.diagnosis, "diagnosis")?;
        validate_medications(&self.medications)?;
        if let Some(date) = &self.follow_up_date {
            parse_date(date, "follow_up_date")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrescriptionRequest {
    pub diagnosis: Option<String>,
    pub medications: Option<Vec<Medication>>,
    pub notes: Option<String>,
    pub follow_up_date: Option<String>,
}

impl UpdatePrescriptionRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(diagnosis) = &self.diagnosis {
            require_text(diagnosis, "diagnosis")?;
        }
        if let Some(medications) = &self.medications {
            validate_medications(medications)?;
        }
        if let Some(date) = &self.follow_up_date {
            parse_date(date, "follow_up_date")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionQuery {
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
