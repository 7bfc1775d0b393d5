//! Booking, listing and the appointment status workflow
//!
//! Booking and rescheduling validate the requested slot against the doctor's
//! generated slots and the booking-window settings. Status changes follow
//! [`check_transition`]; every change notifies the other participant and pushes
//! an `appointment_updated` event to both.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Days, NaiveDate, TimeDelta, Utc};
use tracing::instrument;

use super::doctors::day_slots;
use super::helpers::{notify, push_event, today, EVENT_APPOINTMENT_UPDATED};
use super::{parse_id, ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    check_transition, parse_date, parse_time, require_text, Appointment, AppointmentQuery,
    AppointmentStatus, AppointmentType, BookAppointmentRequest, DoctorSummary, NewAppointment,
    NotificationKind, Paginated, RescheduleRequest, Role, UpdateAppointmentStatusRequest,
    DATE_FORMAT, SETTING_ALLOW_PATIENT_CANCELLATION, SETTING_CANCELLATION_WINDOW_HOURS,
    SETTING_MAX_ADVANCE_DAYS, TIME_FORMAT,
};

const DEFAULT_MAX_ADVANCE_DAYS: i64 = 60;
const DEFAULT_CANCELLATION_WINDOW_HOURS: i64 = 2;

/// Last date a booking may fall on, with the day count actually applied.
///
/// A setting too large (or negative) to add to `today` falls back to the default window.
fn booking_horizon(today: NaiveDate, max_days: i64) -> (i64, NaiveDate) {
    let horizon = |days: i64| {
        u64::try_from(days)
            .ok()
            .and_then(|days| today.checked_add_days(Days::new(days)))
    };
    match horizon(max_days) {
        Some(last) => (max_days, last),
        None => {
            tracing::warn!(
                setting = SETTING_MAX_ADVANCE_DAYS,
                value = max_days,
                "Setting value out of range, using fallback"
            );
            let last = horizon(DEFAULT_MAX_ADVANCE_DAYS).unwrap_or(NaiveDate::MAX);
            (DEFAULT_MAX_ADVANCE_DAYS, last)
        }
    }
}

/// Cancellation window in hours and as a duration; out-of-range values use the default
fn cancellation_window(window_hours: i64) -> (i64, TimeDelta) {
    match TimeDelta::try_hours(window_hours) {
        Some(window) => (window_hours, window),
        None => {
            tracing::warn!(
                setting = SETTING_CANCELLATION_WINDOW_HOURS,
                value = window_hours,
                "Setting value out of range, using fallback"
            );
            (
                DEFAULT_CANCELLATION_WINDOW_HOURS,
                TimeDelta::hours(DEFAULT_CANCELLATION_WINDOW_HOURS),
            )
        }
    }
}

/// A validated slot: date plus start/end in wire format
struct SlotChoice {
    date: String,
    start_time: String,
    end_time: String,
}

/// Check that `date`/`start_time` name a free slot of `doctor` inside the booking window
async fn choose_slot(
    state: &AppState,
    doctor: &DoctorSummary,
    date: &str,
    start_time: &str,
    exclude_appointment: Option<&str>,
) -> AppResult<SlotChoice> {
    if !doctor.is_bookable() {
        return Err(AppError::validation("This doctor is not accepting appointments"));
    }

    let date = parse_date(date, "date")?;
    let start_time = parse_time(start_time, "start_time")?
        .format(TIME_FORMAT)
        .to_string();

    let today = today();
    if date < today {
        return Err(AppError::validation("date cannot be in the past"));
    }
    let (max_days, last_day) = booking_horizon(
        today,
        state
            .db
            .get_setting_value(SETTING_MAX_ADVANCE_DAYS, DEFAULT_MAX_ADVANCE_DAYS)
            .await,
    );
    if date > last_day {
        return Err(AppError::Validation(format!(
            "appointments can be booked at most {} days in advance",
            max_days
        )));
    }

    let slots = day_slots(state, doctor, date, exclude_appointment).await?;
    let slot = slots
        .into_iter()
        .find(|slot| slot.start == start_time)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "{} {} is not one of the doctor's available slots",
                date.format(DATE_FORMAT),
                start_time
            ))
        })?;
    if !slot.available {
        return Err(AppError::Duplicate(
            "The doctor already has an appointment in this slot".to_string(),
        ));
    }

    Ok(SlotChoice {
        date: date.format(DATE_FORMAT).to_string(),
        start_time: slot.start,
        end_time: slot.end,
    })
}

/// Load an appointment the caller participates in (admins see all)
async fn load_for(state: &AppState, auth: &AuthUser, raw_id: &str) -> AppResult<Appointment> {
    let id = parse_id(raw_id)?;
    let appointment = state.db.require_appointment(&id).await?;
    if !auth.is_admin() && !appointment.involves(&auth.id) {
        return Err(AppError::forbidden("You are not a participant of this appointment"));
    }
    Ok(appointment)
}

fn appointment_link(appointment: &Appointment) -> Option<String> {
    Some(format!("/appointments/{}", appointment.id))
}

/// Push the new state to both participants
fn broadcast_update(state: &AppState, appointment: &Appointment) {
    push_event(state, &appointment.patient_id, EVENT_APPOINTMENT_UPDATED, appointment);
    push_event(state, &appointment.doctor_id, EVENT_APPOINTMENT_UPDATED, appointment);
}

/// Notify whoever did not perform the change; admins' changes reach both participants
async fn notify_participants(
    state: &AppState,
    actor: &AuthUser,
    appointment: &Appointment,
    title: &str,
    message: &str,
) {
    let recipients: Vec<&str> = if actor.is_admin() {
        vec![appointment.patient_id.as_str(), appointment.doctor_id.as_str()]
    } else {
        vec![appointment.counterpart_of(&actor.id)]
    };
    for recipient in recipients {
        notify(
            state,
            recipient,
            NotificationKind::Appointment,
            title,
            message,
            appointment_link(appointment),
        )
        .await;
    }
}

#[instrument(skip_all, fields(patient_id = %auth.id, doctor_id = %req.doctor_id, date = %req.date))]
pub async fn book_appointment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<BookAppointmentRequest>,
) -> AppResult<(StatusCode, Json<Appointment>)> {
    auth.require_role(&[Role::Patient])?;

    let doctor_id = parse_id(&req.doctor_id)?;
    let doctor = state.db.require_doctor(&doctor_id).await?;
    let slot = choose_slot(&state, &doctor, &req.date, &req.start_time, None).await?;

    let appointment = state
        .db
        .create_appointment(&NewAppointment {
            patient_id: auth.id.clone(),
            doctor_id: doctor.id.clone(),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            appointment_type: req.appointment_type.unwrap_or(AppointmentType::Consultation),
            reason: req
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        })
        .await?;

    tracing::info!(
        appointment_id = %appointment.id,
        start_time = %appointment.start_time,
        "Appointment booked"
    );

    notify(
        &state,
        &appointment.doctor_id,
        NotificationKind::Appointment,
        "New appointment request",
        format!(
            "{} requested an appointment on {} at {}",
            appointment.patient_name, appointment.date, appointment.start_time
        ),
        appointment_link(&appointment),
    )
    .await;
    broadcast_update(&state, &appointment);

    Ok((StatusCode::CREATED, Json(appointment)))
}

#[instrument(skip_all, fields(user_id = %auth.id, role = %auth.role))]
pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut query): ApiQuery<AppointmentQuery>,
) -> AppResult<Json<Paginated<Appointment>>> {
    match auth.role {
        Role::Patient => query.patient_id = Some(auth.id.clone()),
        Role::Doctor => query.doctor_id = Some(auth.id.clone()),
        Role::Admin => {}
    }
    for bound in [&query.from, &query.to].into_iter().flatten() {
        parse_date(bound, "from/to")?;
    }

    let appointments = state.db.list_appointments(&query).await?;
    tracing::debug!(total = appointments.total, "Listed appointments");
    Ok(Json(appointments))
}

#[instrument(skip_all, fields(user_id = %auth.id, appointment_id = %id))]
pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Appointment>> {
    Ok(Json(load_for(&state, &auth, &id).await?))
}

/// Patients may cancel only when allowed by settings and outside the cancellation window
async fn check_patient_cancellation(state: &AppState, appointment: &Appointment) -> AppResult<()> {
    let allowed = state
        .db
        .get_setting_value(SETTING_ALLOW_PATIENT_CANCELLATION, true)
        .await;
    if !allowed {
        return Err(AppError::forbidden(
            "Appointment cancellation by patients is disabled; please contact the clinic",
        ));
    }

    let (window_hours, window) = cancellation_window(
        state
            .db
            .get_setting_value(
                SETTING_CANCELLATION_WINDOW_HOURS,
                DEFAULT_CANCELLATION_WINDOW_HOURS,
            )
            .await,
    );
    let date = NaiveDate::parse_from_str(&appointment.date, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("stored appointment date is malformed: {}", e))?;
    let time = parse_time(&appointment.start_time, "start_time")?;
    let starts_at = date.and_time(time).and_utc();

    if starts_at - Utc::now() < window {
        return Err(AppError::Validation(format!(
            "appointments cannot be cancelled less than {} hours before they start",
            window_hours
        )));
    }
    Ok(())
}

#[instrument(skip_all, fields(user_id = %auth.id, appointment_id = %id, status = %req.status))]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateAppointmentStatusRequest>,
) -> AppResult<Json<Appointment>> {
    let appointment = load_for(&state, &auth, &id).await?;
    check_transition(appointment.status, req.status, auth.role)?;

    let reason = match req.status {
        AppointmentStatus::Cancelled | AppointmentStatus::Rejected => {
            let reason = req.reason.as_deref().unwrap_or_default();
            Some(require_text(reason, "reason")?)
        }
        _ => None,
    };
    if req.status == AppointmentStatus::Cancelled && auth.role == Role::Patient {
        check_patient_cancellation(&state, &appointment).await?;
    }

    let notes = req
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|notes| !notes.is_empty());
    let updated = state
        .db
        .update_appointment_status(
            &appointment.id,
            appointment.status,
            req.status,
            notes,
            reason.as_deref(),
        )
        .await?;

    tracing::info!(from = %appointment.status, to = %updated.status, "Appointment status changed");

    let mut message = format!(
        "Your appointment on {} at {} is now {}",
        updated.date, updated.start_time, updated.status
    );
    if let Some(reason) = &reason {
        message.push_str(&format!(": {}", reason));
    }
    notify_participants(&state, &auth, &updated, "Appointment updated", &message).await;
    broadcast_update(&state, &updated);

    Ok(Json(updated))
}

#[instrument(skip_all, fields(user_id = %auth.id, appointment_id = %id, date = %req.date))]
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RescheduleRequest>,
) -> AppResult<Json<Appointment>> {
    auth.require_role(&[Role::Patient, Role::Doctor])?;

    let appointment = load_for(&state, &auth, &id).await?;
    if !appointment.status.is_active() {
        return Err(AppError::Validation(format!(
            "a {} appointment cannot be rescheduled",
            appointment.status
        )));
    }

    let doctor = state.db.require_doctor(&appointment.doctor_id).await?;
    let slot = choose_slot(
        &state,
        &doctor,
        &req.date,
        &req.start_time,
        Some(&appointment.id),
    )
    .await?;

    let updated = state
        .db
        .reschedule_appointment(
            &appointment.id,
            appointment.status,
            &slot.date,
            &slot.start_time,
            &slot.end_time,
        )
        .await?;

    tracing::info!(
        from_date = %appointment.date,
        from_time = %appointment.start_time,
        to_time = %updated.start_time,
        "Appointment rescheduled"
    );

    let message = format!(
        "Appointment moved from {} {} to {} {}; awaiting confirmation",
        appointment.date, appointment.start_time, updated.date, updated.start_time
    );
    notify_participants(&state, &auth, &updated, "Appointment rescheduled", &message).await;
    broadcast_update(&state, &updated);

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_horizon_falls_back_when_out_of_range() {
        let today = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();

        assert_eq!(
            booking_horizon(today, 10),
            (10, NaiveDate::from_ymd_opt(2030, 3, 11).unwrap())
        );
        for bad in [100_000_000_000_000, i64::MAX, -1] {
            assert_eq!(
                booking_horizon(today, bad),
                (60, NaiveDate::from_ymd_opt(2030, 4, 30).unwrap())
            );
        }
    }

    #[test]
    fn test_cancellation_window_falls_back_when_out_of_range() {
        assert_eq!(cancellation_window(24), (24, TimeDelta::hours(24)));
        assert_eq!(
            cancellation_window(100_000_000_000_000),
            (2, TimeDelta::hours(2))
        );
    }
}
