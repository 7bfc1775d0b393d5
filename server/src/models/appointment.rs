// server/src/models/appointment.rs
//
// Appointment record and its status state machine.

use serde::{Deserialize, Serialize};

use super::Role;
use crate::error::{AppError, AppResult};

string_enum!(
    AppointmentStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        Rejected => "rejected",
        NoShow => "no_show",
    }
);

impl AppointmentStatus {
    /// Active appointments hold their slot
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

string_enum!(
    AppointmentType {
        Consultation => "consultation",
        FollowUp => "follow_up",
        CheckUp => "check_up",
        Emergency => "emergency",
        Online => "online",
    }
);

/// Check whether `actor` may move an appointment from `from` to `to`.
///
/// Invalid transitions are validation errors; valid transitions attempted by the wrong
/// role are forbidden.
pub fn check_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
    actor: Role,
) -> AppResult<()> {
    use AppointmentStatus::*;

    let allowed_roles: &[Role] = match (from, to) {
        (Pending, Confirmed) | (Pending, Rejected) => &[Role::Doctor],
        (Pending, Cancelled) | (Confirmed, Cancelled) => &[Role::Patient, Role::Doctor, Role::Admin],
        (Confirmed, Completed) | (Confirmed, NoShow) => &[Role::Doctor],
        _ => {
            return Err(AppError::Validation(format!(
                "cannot change appointment status from {} to {}",
                from, to
            )))
        }
    };

    if allowed_roles.contains(&actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "a {} cannot change appointment status from {} to {}",
            actor, from, to
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub doctor_specialization: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    /// The other participant, from `user_id`'s point of view
    pub fn counterpart_of(&self, user_id: &str) -> &str {
        if self.patient_id == user_id {
            &self.doctor_id
        } else {
            &self.patient_id
        }
    }
}

/// Validated booking ready to be stored as a pending appointment
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    pub date: String,
    pub start_time: String,
    #[serde(default)]
    pub appointment_type: Option<AppointmentType>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
    /// Required when cancelling or rejecting
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub start_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    /// Inclusive lower bound, YYYY-MM-DD
    pub from: Option<String>,
    /// Inclusive upper bound, YYYY-MM-DD
    pub to: Option<String>,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    /// date | created (prefix with '-' for descending)
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
