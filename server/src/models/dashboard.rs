// server/src/models/dashboard.rs
//
// Role-specific dashboard payloads: counts plus a handful of recent items.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{AdminLog, Appointment, RatingSummary, Review};

/// Number of recent items included in each dashboard list
pub const DASHBOARD_RECENT_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    /// Keyed by role name
    pub users_by_role: BTreeMap<String, i64>,
    pub pending_doctor_approvals: i64,
    /// Keyed by appointment status
    pub appointments_by_status: BTreeMap<String, i64>,
    pub todays_appointments: i64,
    pub recent_appointments: Vec<Appointment>,
    pub recent_admin_logs: Vec<AdminLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorDashboard {
    pub todays_appointments: Vec<Appointment>,
    pub pending_requests: i64,
    pub upcoming_count: i64,
    pub completed_count: i64,
    pub total_patients: i64,
    pub rating: RatingSummary,
    pub recent_reviews: Vec<Review>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub upcoming_appointments: Vec<Appointment>,
    pub completed_count: i64,
    pub prescriptions_count: i64,
    pub reports_count: i64,
    pub unread_notifications: i64,
}
