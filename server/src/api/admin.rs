//! Administration: accounts, doctor approval, moderation and the audit log
//!
//! Every mutating handler records an [`AdminAction`] through
//! [`record_admin_action`](super::helpers::record_admin_action).

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use tracing::instrument;

use super::helpers::{notify, record_admin_action};
use super::{parse_id, ApiJson, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    AdminAction, AdminLog, AdminLogQuery, Appointment, AppointmentQuery, ApprovalStatus,
    DoctorSummary, NotificationKind, Paginated, Review, ReviewQuery, Role, UpdateReviewStatusRequest,
    UpdateUserStatusRequest, User, UserQuery, UserStatus,
};

#[instrument(skip_all, fields(admin_id = %auth.id))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> AppResult<Json<Paginated<User>>> {
    auth.require_role(&[Role::Admin])?;

    let users = state.db.list_users(&query).await?;
    tracing::debug!(total = users.total, "Listed users");
    Ok(Json(users))
}

#[instrument(skip_all, fields(admin_id = %auth.id, user_id = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    Ok(Json(state.db.require_user(&id).await?))
}

/// Suspend or reactivate an account. Pending and rejected are owned by the
/// doctor approval flow.
#[instrument(skip_all, fields(admin_id = %auth.id, user_id = %id, status = %req.status))]
pub async fn update_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserStatusRequest>,
) -> AppResult<Json<User>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    let action = match req.status {
        UserStatus::Active => AdminAction::Activate,
        UserStatus::Suspended => AdminAction::Suspend,
        other => {
            return Err(AppError::Validation(format!(
                "status must be active or suspended, not {}",
                other
            )))
        }
    };
    if id == auth.id {
        return Err(AppError::validation("You cannot change your own account status"));
    }

    let previous = state.db.require_user(&id).await?;
    let user = state.db.update_user_status(&id, req.status).await?;

    record_admin_action(
        &state,
        &auth,
        action,
        "users",
        Some(&id),
        json!({ "from": previous.status, "to": user.status }),
    )
    .await;
    notify(
        &state,
        &id,
        NotificationKind::System,
        "Account status changed",
        format!("Your account is now {}", user.status),
        None,
    )
    .await;

    tracing::info!(from = %previous.status, "User status updated");
    Ok(Json(user))
}

#[instrument(skip_all, fields(admin_id = %auth.id, user_id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    if id == auth.id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    let user = state.db.require_user(&id).await?;
    if !state.db.delete_user(&id).await? {
        return Err(AppError::not_found("User"));
    }

    record_admin_action(
        &state,
        &auth,
        AdminAction::Delete,
        "users",
        Some(&id),
        json!({ "email": user.email, "role": user.role }),
    )
    .await;

    tracing::info!(role = %user.role, "User deleted");
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn set_approval(
    state: &AppState,
    auth: &AuthUser,
    raw_id: &str,
    approval: ApprovalStatus,
) -> AppResult<DoctorSummary> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(raw_id)?;
    let current = state.db.require_doctor(&id).await?;
    if current.approval_status == approval {
        return Err(AppError::Validation(format!("Doctor is already {}", approval)));
    }

    let doctor = state.db.set_doctor_approval(&id, approval).await?;

    let (action, title, message) = match approval {
        ApprovalStatus::Approved => (
            AdminAction::Approve,
            "Account approved",
            "Your doctor account has been approved. Patients can now book appointments with you.",
        ),
        _ => (
            AdminAction::Reject,
            "Account rejected",
            "Your doctor account application has been rejected.",
        ),
    };
    record_admin_action(
        state,
        auth,
        action,
        "doctor_profiles",
        Some(&id),
        json!({ "from": current.approval_status, "to": approval }),
    )
    .await;
    notify(state, &id, NotificationKind::System, title, message, None).await;

    tracing::info!(doctor_id = %id, approval = %approval, "Doctor approval updated");
    Ok(doctor)
}

#[instrument(skip_all, fields(admin_id = %auth.id, doctor_id = %id))]
pub async fn approve_doctor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DoctorSummary>> {
    Ok(Json(
        set_approval(&state, &auth, &id, ApprovalStatus::Approved).await?,
    ))
}

#[instrument(skip_all, fields(admin_id = %auth.id, doctor_id = %id))]
pub async fn reject_doctor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DoctorSummary>> {
    Ok(Json(
        set_approval(&state, &auth, &id, ApprovalStatus::Rejected).await?,
    ))
}

#[instrument(skip_all, fields(admin_id = %auth.id))]
pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<AppointmentQuery>,
) -> AppResult<Json<Paginated<Appointment>>> {
    auth.require_role(&[Role::Admin])?;
    Ok(Json(state.db.list_appointments(&query).await?))
}

#[instrument(skip_all, fields(admin_id = %auth.id))]
pub async fn list_reviews(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> AppResult<Json<Paginated<Review>>> {
    auth.require_role(&[Role::Admin])?;
    Ok(Json(state.db.list_reviews(&query).await?))
}

#[instrument(skip_all, fields(admin_id = %auth.id, review_id = %id, status = %req.status))]
pub async fn update_review_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateReviewStatusRequest>,
) -> AppResult<Json<Review>> {
    auth.require_role(&[Role::Admin])?;

    let id = parse_id(&id)?;
    let previous = state.db.require_review(&id).await?;
    let review = state.db.update_review_status(&id, req.status).await?;

    record_admin_action(
        &state,
        &auth,
        AdminAction::Update,
        "reviews",
        Some(&id),
        json!({ "status": { "from": previous.status, "to": review.status } }),
    )
    .await;

    tracing::info!("Review moderated");
    Ok(Json(review))
}

#[instrument(skip_all, fields(admin_id = %auth.id))]
pub async fn list_admin_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<AdminLogQuery>,
) -> AppResult<Json<Paginated<AdminLog>>> {
    auth.require_role(&[Role::Admin])?;
    Ok(Json(state.db.list_admin_logs(&query).await?))
}
