use axum::{extract::State, Json};
use tracing::instrument;

use super::helpers::today;
use super::{AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{AdminDashboard, DoctorDashboard, PatientDashboard, Role, DATE_FORMAT};

fn today_str() -> String {
    today().format(DATE_FORMAT).to_string()
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<AdminDashboard>> {
    auth.require_role(&[Role::Admin])?;
    Ok(Json(state.db.admin_dashboard(&today_str()).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn doctor_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DoctorDashboard>> {
    auth.require_role(&[Role::Doctor])?;
    Ok(Json(state.db.doctor_dashboard(&auth.id, &today_str()).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn patient_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<PatientDashboard>> {
    auth.require_role(&[Role::Patient])?;
    Ok(Json(state.db.patient_dashboard(&auth.id, &today_str()).await?))
}
