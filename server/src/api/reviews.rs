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
    AppointmentStatus, CreateReviewRequest, NotificationKind, Paginated, Review, ReviewQuery,
    ReviewStatus, Role,
};

#[instrument(skip_all, fields(patient_id = %auth.id, appointment_id = %req.appointment_id))]
pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    auth.require_role(&[Role::Patient])?;
    req.validate()?;

    let appointment_id = parse_id(&req.appointment_id)?;
    let appointment = state.db.require_appointment(&appointment_id).await?;
    if appointment.patient_id != auth.id {
        return Err(AppError::forbidden("You can only review your own appointments"));
    }
    if appointment.status != AppointmentStatus::Completed {
        return Err(AppError::validation("Only completed appointments can be reviewed"));
    }

    let review = state.db.create_review(&appointment, &req).await?;
    tracing::info!(review_id = %review.id, rating = review.rating, "Review submitted");

    notify(
        &state,
        &review.doctor_id,
        NotificationKind::Review,
        "New review",
        format!("{} rated your consultation {}/5", review.patient_name, review.rating),
        Some(format!("/doctors/{}/reviews", review.doctor_id)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Visible reviews of one doctor, newest first
#[instrument(skip_all, fields(doctor_id = %id))]
pub async fn doctor_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> AppResult<Json<Paginated<Review>>> {
    let id = parse_id(&id)?;
    state.db.require_doctor(&id).await?;

    let reviews = state
        .db
        .list_reviews(&ReviewQuery {
            status: Some(ReviewStatus::Visible),
            doctor_id: Some(id),
            ..query
        })
        .await?;
    Ok(Json(reviews))
}

#[instrument(skip_all, fields(patient_id = %auth.id))]
pub async fn my_reviews(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Review>>> {
    auth.require_role(&[Role::Patient])?;
    Ok(Json(state.db.list_reviews_by_patient(&auth.id).await?))
}
