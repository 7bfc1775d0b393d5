//! Doctor directory, profiles and bookable slots

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;

use super::helpers::today;
use super::{parse_id, ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    generate_slots, parse_date, DoctorQuery, DoctorSummary, Paginated,
    PatientSummary, Role, SlotQuery, TimeSlot, UpdateDoctorProfileRequest,
    DATE_FORMAT, SETTING_SLOT_MINUTES, TIME_FORMAT,
};

const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Slots of `doctor` on `date`, flagged by availability.
///
/// A slot is unavailable when it overlaps an active appointment other than
/// `exclude_appointment`. Slots that already started are omitted for today.
pub(super) async fn day_slots(
    state: &AppState,
    doctor: &DoctorSummary,
    date: NaiveDate,
    exclude_appointment: Option<&str>,
) -> AppResult<Vec<TimeSlot>> {
    let slot_minutes = state
        .db
        .get_setting_value(SETTING_SLOT_MINUTES, DEFAULT_SLOT_MINUTES)
        .await;
    let date_str = date.format(DATE_FORMAT).to_string();
    let booked = state
        .db
        .booked_slots(&doctor.id, &date_str, exclude_appointment)
        .await?;

    let now = Utc::now();
    let started_cutoff = (date == now.date_naive()).then(|| now.time());

    let slots = generate_slots(&doctor.availability, date, slot_minutes)
        .into_iter()
        .filter(|(start, _)| started_cutoff.map_or(true, |cutoff| *start > cutoff))
        .map(|(start, end)| {
            let start = start.format(TIME_FORMAT).to_string();
            let end = end.format(TIME_FORMAT).to_string();
            let available = !booked
                .iter()
                .any(|(booked_start, booked_end)| *booked_start < end && start < *booked_end);
            TimeSlot {
                start,
                end,
                available,
            }
        })
        .collect();

    Ok(slots)
}

#[instrument(skip_all)]
pub async fn list_doctors(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DoctorQuery>,
) -> AppResult<Json<Paginated<DoctorSummary>>> {
    let doctors = state.db.list_doctors(&query, true).await?;
    tracing::debug!(total = doctors.total, "Listed doctors");
    Ok(Json(doctors))
}

/// Public profile; unapproved doctors are only visible to themselves and admins
#[instrument(skip_all, fields(doctor_id = %id))]
pub async fn get_doctor(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<DoctorSummary>> {
    let id = parse_id(&id)?;
    let doctor = state.db.require_doctor(&id).await?;

    let privileged = auth
        .as_ref()
        .is_some_and(|user| user.is_admin() || user.id == doctor.id);
    if !doctor.is_bookable() && !privileged {
        return Err(AppError::not_found("Doctor"));
    }
    Ok(Json(doctor))
}

#[derive(Debug, Serialize)]
pub struct DaySlots {
    pub doctor_id: String,
    pub date: String,
    pub slots: Vec<TimeSlot>,
}

#[instrument(skip_all, fields(doctor_id = %id, date = %query.date))]
pub async fn get_slots(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<SlotQuery>,
) -> AppResult<Json<DaySlots>> {
    let id = parse_id(&id)?;
    let date = parse_date(&query.date, "date")?;
    if date < today() {
        return Err(AppError::validation("date cannot be in the past"));
    }

    let doctor = state.db.require_doctor(&id).await?;
    if !doctor.is_bookable() {
        return Err(AppError::not_found("Doctor"));
    }

    let slots = day_slots(&state, &doctor, date, None).await?;
    tracing::debug!(count = slots.len(), "Computed slots");
    Ok(Json(DaySlots {
        doctor_id: doctor.id,
        date: query.date,
        slots,
    }))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DoctorSummary>> {
    auth.require_role(&[Role::Doctor])?;
    Ok(Json(state.db.require_doctor(&auth.id).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UpdateDoctorProfileRequest>,
) -> AppResult<Json<DoctorSummary>> {
    auth.require_role(&[Role::Doctor])?;
    req.validate()?;

    let doctor = state.db.update_doctor_profile(&auth.id, &req).await?;
    tracing::info!(
        availability_windows = doctor.availability.len(),
        "Doctor profile updated"
    );
    Ok(Json(doctor))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn my_patients(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<PatientSummary>>> {
    auth.require_role(&[Role::Doctor])?;
    Ok(Json(state.db.list_doctor_patients(&auth.id).await?))
}
