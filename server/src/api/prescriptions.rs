use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use super::helpers::notify;
use super::{parse_id, ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    AppointmentStatus, CreatePrescriptionRequest, NotificationKind, Paginated, Prescription,
    PrescriptionQuery, Role, UpdatePrescriptionRequest,
};

fn can_view(auth: &AuthUser, prescription: &Prescription) -> bool {
    auth.is_admin() || auth.id == prescription.doctor_id || auth.id == prescription.patient_id
}

#[instrument(skip_all, fields(doctor_id = %auth.id, appointment_id = %req.appointment_id))]
pub async fn create_prescription(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreatePrescriptionRequest>,
) -> AppResult<(StatusCode, Json<Prescription>)> {
    auth.require_role(&[Role::Doctor])?;
    req.validate()?;

    let appointment_id = parse_id(&req.appointment_id)?;
    let appointment = state.db.require_appointment(&appointment_id).await?;
    if appointment.doctor_id != auth.id {
        return Err(AppError::forbidden(
            "You can only prescribe for your own appointments",
        ));
    }
    if !matches!(
        appointment.status,
        AppointmentStatus::Confirmed | AppointmentStatus::Completed
    ) {
        return Err(AppError::Validation(format!(
            "cannot prescribe for a {} appointment",
            appointment.status
        )));
    }

    let prescription = state.db.create_prescription(&appointment, &req).await?;
    tracing::info!(
        prescription_id = %prescription.id,
        medications = prescription.medications.len(),
        "Prescription issued"
    );

    notify(
        &state,
        &prescription.patient_id,
        NotificationKind::Prescription,
        "New prescription",
        format!("Dr. {} issued a prescription: {}", prescription.doctor_name, prescription.diagnosis),
        Some(format!("/prescriptions/{}", prescription.id)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(prescription)))
}

#[instrument(skip_all, fields(user_id = %auth.id, role = %auth.role))]
pub async fn list_prescriptions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut query): ApiQuery<PrescriptionQuery>,
) -> AppResult<Json<Paginated<Prescription>>> {
    let doctor_scope = match auth.role {
        Role::Patient => {
            query.patient_id = Some(auth.id.clone());
            None
        }
        Role::Doctor => Some(auth.id.as_str()),
        Role::Admin => None,
    };

    Ok(Json(
        state.db.list_prescriptions(&query, doctor_scope).await?,
    ))
}

#[instrument(skip_all, fields(user_id = %auth.id, prescription_id = %id))]
pub async fn get_prescription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Prescription>> {
    let id = parse_id(&id)?;
    let prescription = state.db.require_prescription(&id).await?;
    if !can_view(&auth, &prescription) {
        return Err(AppError::forbidden("You cannot view this prescription"));
    }
    Ok(Json(prescription))
}

#[instrument(skip_all, fields(user_id = %auth.id, prescription_id = %id))]
pub async fn update_prescription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePrescriptionRequest>,
) -> AppResult<Json<Prescription>> {
    auth.require_role(&[Role::Doctor])?;
    req.validate()?;

    let id = parse_id(&id)?;
    let existing = state.db.require_prescription(&id).await?;
    if existing.doctor_id != auth.id {
        return Err(AppError::forbidden(
            "Only the issuing doctor can modify a prescription",
        ));
    }

    let prescription = state.db.update_prescription(&id, &req).await?;
    tracing::info!("Prescription updated");

    notify(
        &state,
        &prescription.patient_id,
        NotificationKind::Prescription,
        "Prescription updated",
        format!("Dr. {} updated your prescription", prescription.doctor_name),
        Some(format!("/prescriptions/{}", prescription.id)),
    )
    .await;

    Ok(Json(prescription))
}
