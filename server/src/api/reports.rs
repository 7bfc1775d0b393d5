//! Medical reports: upload with optional base64 attachment, listing and download

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::instrument;

use super::helpers::{notify, record_admin_action};
use super::{parse_id, ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    AdminAction, MedicalReport, NewReport, NotificationKind, Paginated, ReportFile, ReportQuery,
    Role, UploadReportRequest,
};

/// Admins, the patient, the uploader, and doctors who treat the patient
async fn can_access(state: &AppState, auth: &AuthUser, report: &MedicalReport) -> AppResult<bool> {
    Ok(match auth.role {
        Role::Admin => true,
        Role::Patient => report.patient_id == auth.id,
        Role::Doctor => {
            report.uploaded_by == auth.id
                || state
                    .db
                    .has_shared_appointment(&auth.id, &report.patient_id)
                    .await?
        }
    })
}

async fn load_for(state: &AppState, auth: &AuthUser, raw_id: &str) -> AppResult<MedicalReport> {
    let id = parse_id(raw_id)?;
    let report = state.db.require_report(&id).await?;
    if !can_access(state, auth, &report).await? {
        return Err(AppError::forbidden("You cannot access this report"));
    }
    Ok(report)
}

#[instrument(skip_all, fields(user_id = %auth.id, role = %auth.role, report_type = %req.report_type))]
pub async fn upload_report(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UploadReportRequest>,
) -> AppResult<(StatusCode, Json<MedicalReport>)> {
    auth.require_role(&[Role::Patient, Role::Doctor])?;
    req.validate()?;

    let patient_id = match auth.role {
        Role::Doctor => {
            let raw = req
                .patient_id
                .as_deref()
                .ok_or_else(|| AppError::validation("patient_id is required"))?;
            let patient_id = parse_id(raw)?;
            if !state.db.has_shared_appointment(&auth.id, &patient_id).await? {
                return Err(AppError::forbidden(
                    "You can only upload reports for patients you have an appointment with",
                ));
            }
            patient_id
        }
        _ => auth.id.clone(),
    };
    state.db.require_patient(&patient_id).await?;

    let appointment_id = match req.appointment_id.as_deref() {
        Some(raw) => {
            let appointment = state.db.require_appointment(&parse_id(raw)?).await?;
            if appointment.patient_id != patient_id || !appointment.involves(&auth.id) {
                return Err(AppError::validation(
                    "appointment_id must reference an appointment of this patient",
                ));
            }
            Some(appointment.id)
        }
        None => None,
    };

    let file = match &req.file {
        Some(attachment) => Some(ReportFile {
            file_name: attachment.file_name.trim().to_string(),
            content_type: attachment.content_type.clone(),
            data: attachment.decode(state.config.uploads.max_file_bytes)?,
        }),
        None => None,
    };

    let report = state
        .db
        .create_report(NewReport {
            patient_id,
            uploaded_by: auth.id.clone(),
            appointment_id,
            title: req.title,
            report_type: req.report_type,
            description: req.description,
            file,
        })
        .await?;

    tracing::info!(
        report_id = %report.id,
        patient_id = %report.patient_id,
        file_size = report.file_size,
        "Report uploaded"
    );

    if report.uploaded_by != report.patient_id {
        notify(
            &state,
            &report.patient_id,
            NotificationKind::Report,
            "New medical report",
            format!("{} added a report: {}", report.uploaded_by_name, report.title),
            Some(format!("/reports/{}", report.id)),
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(report)))
}

#[instrument(skip_all, fields(user_id = %auth.id, role = %auth.role))]
pub async fn list_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(mut query): ApiQuery<ReportQuery>,
) -> AppResult<Json<Paginated<MedicalReport>>> {
    let doctor_scope = match auth.role {
        Role::Patient => {
            query.patient_id = Some(auth.id.clone());
            None
        }
        Role::Doctor => Some(auth.id.as_str()),
        Role::Admin => None,
    };

    Ok(Json(state.db.list_reports(&query, doctor_scope).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id, report_id = %id))]
pub async fn get_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MedicalReport>> {
    Ok(Json(load_for(&state, &auth, &id).await?))
}

/// Raw attachment bytes with the stored content type
#[instrument(skip_all, fields(user_id = %auth.id, report_id = %id))]
pub async fn download_report_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let report = load_for(&state, &auth, &id).await?;
    let file = state
        .db
        .get_report_file(&report.id)
        .await?
        .ok_or_else(|| AppError::not_found("Report file"))?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let file_name: String = file
        .file_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    tracing::info!(bytes = file.data.len(), "Report file downloaded");
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.data,
    )
        .into_response())
}

#[instrument(skip_all, fields(user_id = %auth.id, report_id = %id))]
pub async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    let report = state.db.require_report(&id).await?;
    if !auth.is_admin() && report.uploaded_by != auth.id {
        return Err(AppError::forbidden(
            "Only the uploader or an administrator can delete a report",
        ));
    }

    if !state.db.delete_report(&id).await? {
        return Err(AppError::not_found("Report"));
    }

    if auth.is_admin() {
        record_admin_action(
            &state,
            &auth,
            AdminAction::Delete,
            "medical_reports",
            Some(&id),
            json!({ "title": report.title, "patient_id": report.patient_id }),
        )
        .await;
    }

    tracing::info!("Report deleted");
    Ok(Json(json!({ "success": true, "id": id })))
}
