//! Shared helpers for database tests

use crate::db::Database;
use crate::models::{
    new_id, now_rfc3339, ApprovalStatus, AppointmentType, NewAppointment, Role,
    UpdateDoctorProfileRequest, User, UserStatus, Weekday, WeeklySlot,
};

pub(crate) async fn create_test_db() -> Database {
    Database::new("sqlite::memory:").await.unwrap()
}

pub(crate) async fn create_user(db: &Database, role: Role, email: &str) -> User {
    let now = now_rfc3339();
    let user = User {
        id: new_id(),
        email: email.to_string(),
        password_hash: "not-a-real-hash".to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        phone: None,
        role,
        status: UserStatus::Active,
        created_at: now.clone(),
        updated_at: now,
        last_login_at: None,
    };
    db.create_user(&user, Some("Cardiology")).await.unwrap();
    user
}

/// Approved doctor available every Monday 09:00-12:00 in 30 minute slots
pub(crate) async fn create_approved_doctor(db: &Database, email: &str) -> User {
    let doctor = create_user(db, Role::Doctor, email).await;
    db.update_doctor_profile(
        &doctor.id,
        &UpdateDoctorProfileRequest {
            availability: Some(vec![WeeklySlot {
                day: Weekday::Mon,
                start: "09:00".to_string(),
                end: "12:00".to_string(),
                slot_minutes: Some(30),
            }]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    db.set_doctor_approval(&doctor.id, ApprovalStatus::Approved)
        .await
        .unwrap();
    doctor
}

pub(crate) fn booking(
    patient: &User,
    doctor: &User,
    date: &str,
    start: &str,
    end: &str,
) -> NewAppointment {
    NewAppointment {
        patient_id: patient.id.clone(),
        doctor_id: doctor.id.clone(),
        date: date.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        appointment_type: AppointmentType::Consultation,
        reason: Some("Checkup".to_string()),
    }
}

mod notifications_tests;
mod settings_tests;
