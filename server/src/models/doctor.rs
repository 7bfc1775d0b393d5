// server/src/models/doctor.rs
//
// Doctor profile and weekly availability.
// Bookable slots are derived from the availability windows of the requested weekday.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{parse_time, UserStatus, TIME_FORMAT};
use crate::error::{AppError, AppResult};

string_enum!(
    Weekday {
        Mon => "mon",
        Tue => "tue",
        Wed => "wed",
        Thu => "thu",
        Fri => "fri",
        Sat => "sat",
        Sun => "sun",
    }
);

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

string_enum!(
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

/// One recurring availability window, e.g. Monday 09:00-12:00 in 30 minute slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub day: Weekday,
    pub start: String,
    pub end: String,
    /// Overrides the `appointment_slot_minutes` setting for this window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_minutes: Option<u32>,
}

pub const MIN_SLOT_MINUTES: u32 = 5;
pub const MAX_SLOT_MINUTES: u32 = 240;

impl WeeklySlot {
    pub fn validate(&self) -> AppResult<()> {
        let start = parse_time(&self.start, "availability.start")?;
        let end = parse_time(&self.end, "availability.end")?;
        if start >= end {
            return Err(AppError::Validation(format!(
                "availability window {} {}-{} must end after it starts",
                self.day, self.start, self.end
            )));
        }
        if let Some(minutes) = self.slot_minutes {
            if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&minutes) {
                return Err(AppError::Validation(format!(
                    "slot_minutes must be between {} and {}",
                    MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub user_id: String,
    pub specialization: String,
    pub qualifications: String,
    pub experience_years: i64,
    pub consultation_fee: f64,
    pub bio: Option<String>,
    pub hospital: Option<String>,
    pub availability: Vec<WeeklySlot>,
    pub approval_status: ApprovalStatus,
    pub updated_at: String,
}

/// Slot boundaries for `date`, in start order. Windows that do not divide evenly drop the remainder.
pub fn generate_slots(
    availability: &[WeeklySlot],
    date: NaiveDate,
    default_slot_minutes: u32,
) -> Vec<(NaiveTime, NaiveTime)> {
    let weekday = Weekday::from(date.weekday());
    let mut slots = Vec::new();

    for window in availability.iter().filter(|w| w.day == weekday) {
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(&window.start, TIME_FORMAT),
            NaiveTime::parse_from_str(&window.end, TIME_FORMAT),
        ) else {
            continue;
        };
        let minutes = window
            .slot_minutes
            .unwrap_or(default_slot_minutes)
            .clamp(MIN_SLOT_MINUTES, MAX_SLOT_MINUTES);
        let step = Duration::minutes(i64::from(minutes));

        let mut cursor = start;
        while cursor < end {
            let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
            if wrapped != 0 || slot_end > end {
                break;
            }
            slots.push((cursor, slot_end));
            cursor = slot_end;
        }
    }

    slots.sort();
    slots.dedup();
    slots
}

/// Public view of a doctor: account fields, profile, and review aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: UserStatus,
    pub specialization: String,
    pub qualifications: String,
    pub experience_years: i64,
    pub consultation_fee: f64,
    pub bio: Option<String>,
    pub hospital: Option<String>,
    pub availability: Vec<WeeklySlot>,
    pub approval_status: ApprovalStatus,
    pub rating_average: f64,
    pub rating_count: i64,
}

impl DoctorSummary {
    /// Approved doctors with an active account accept bookings and appear in the directory
    pub fn is_bookable(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved && self.status == UserStatus::Active
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub experience_years: Option<i64>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub hospital: Option<String>,
    pub availability: Option<Vec<WeeklySlot>>,
}

impl UpdateDoctorProfileRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(years) = self.experience_years {
            if !(0..=80).contains(&years) {
                return Err(AppError::validation("experience_years must be between 0 and 80"));
            }
        }
        if let Some(fee) = self.consultation_fee {
            if !fee.is_finite() || fee < 0.0 {
                return Err(AppError::validation("consultation_fee must be a non-negative amount"));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name cannot be blank"));
            }
        }
        if let Some(availability) = &self.availability {
            for window in availability {
                window.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
    pub available: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorQuery {
    pub specialization: Option<String>,
    pub search: Option<String>,
    /// rating | fee | experience | name (prefix with '-' for descending)
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: String,
}
