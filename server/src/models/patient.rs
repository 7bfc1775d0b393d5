use serde::{Deserialize, Serialize};

use super::parse_date;
use crate::error::{AppError, AppResult};

string_enum!(
    Gender {
        Male => "male",
        Female => "female",
        Other => "other",
    }
);

pub const BLOOD_GROUPS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user_id: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub allergies: Vec<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub updated_at: String,
}

/// Patient account joined with its profile, as shown to the patient and their doctors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile: PatientProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub allergies: Option<Vec<String>>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl UpdatePatientProfileRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(dob) = &self.date_of_birth {
            let date = parse_date(dob, "date_of_birth")?;
            if date > chrono::Utc::now().date_naive() {
                return Err(AppError::validation("date_of_birth cannot be in the future"));
            }
        }
        if let Some(group) = &self.blood_group {
            if !BLOOD_GROUPS.contains(&group.as_str()) {
                return Err(AppError::Validation(format!(
                    "blood_group must be one of: {}",
                    BLOOD_GROUPS.join(", ")
                )));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name cannot be blank"));
            }
        }
        if let Some(contact) = &self.emergency_contact {
            if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
                return Err(AppError::validation(
                    "emergency_contact requires both name and phone",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_group_must_be_known() {
        let request = UpdatePatientProfileRequest {
            blood_group: Some("C+".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = UpdatePatientProfileRequest {
            blood_group: Some("AB-".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let request = UpdatePatientProfileRequest {
            date_of_birth: Some("2999-01-01".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_emergency_contact_requires_phone() {
        let request = UpdatePatientProfileRequest {
            emergency_contact: Some(EmergencyContact {
                name: "Sam".to_string(),
                phone: " ".to_string(),
                relation: None,
            }),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}
