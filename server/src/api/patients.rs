use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use super::{parse_id, ApiJson, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{PatientSummary, Role, UpdatePatientProfileRequest};

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<PatientSummary>> {
    auth.require_role(&[Role::Patient])?;
    Ok(Json(state.db.require_patient(&auth.id).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UpdatePatientProfileRequest>,
) -> AppResult<Json<PatientSummary>> {
    auth.require_role(&[Role::Patient])?;
    req.validate()?;

    let patient = state.db.update_patient_profile(&auth.id, &req).await?;
    tracing::info!("Patient profile updated");
    Ok(Json(patient))
}

/// Patient record as seen by a treating doctor or an admin
#[instrument(skip_all, fields(user_id = %auth.id, patient_id = %id))]
pub async fn get_patient(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<PatientSummary>> {
    let id = parse_id(&id)?;

    match auth.role {
        Role::Admin => {}
        Role::Patient if auth.id == id => {}
        Role::Doctor => {
            if !state.db.has_shared_appointment(&auth.id, &id).await? {
                tracing::warn!("Doctor requested a patient without a shared appointment");
                return Err(AppError::forbidden(
                    "You can only view patients you have an appointment with",
                ));
            }
        }
        Role::Patient => {
            return Err(AppError::forbidden("You can only view your own profile"));
        }
    }

    Ok(Json(state.db.require_patient(&id).await?))
}
