//! Domain records and request/response payloads
//!
//! Enumerations are persisted as their snake_case text form; `string_enum!` generates the
//! serde names, `as_str`, `Display` and a `FromStr` that rejects unknown values with a
//! validation error.

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::AppError::Validation(format!(
                        "'{}' is not a valid {}; expected one of: {}",
                        other,
                        stringify!($name),
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

mod admin_log;
mod appointment;
mod chat;
mod dashboard;
mod doctor;
mod notification;
mod pagination;
mod patient;
mod prescription;
mod report;
mod review;
mod setting;
mod user;

pub use admin_log::*;
pub use appointment::*;
pub use chat::*;
pub use dashboard::*;
pub use doctor::*;
pub use notification::*;
pub use pagination::*;
pub use patient::*;
pub use prescription::*;
pub use report::*;
pub use review::*;
pub use setting::*;
pub use user::*;

use chrono::{NaiveDate, NaiveTime};

use crate::error::{AppError, AppResult};

/// Wire format for appointment dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format for slot times
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("{} must be a date formatted YYYY-MM-DD", field)))
}

pub fn parse_time(value: &str, field: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| AppError::Validation(format!("{} must be a time formatted HH:MM", field)))
}

/// Trim and reject empty required text
pub fn require_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Fixed-width UTC timestamp so stored values sort lexicographically
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
