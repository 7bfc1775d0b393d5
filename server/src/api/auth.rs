//! Registration, login and password management

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use tracing::instrument;

use super::{helpers::notify, ApiJson, AppState, AuthUser};
use crate::auth::{hash_password, issue_token, verify_password};
use crate::error::{AppError, AppResult};
use crate::models::{
    new_id, now_rfc3339, validate_password, AuthResponse, ChangePasswordRequest, LoginRequest,
    NotificationKind, RegisterRequest, Role, User, UserQuery, UserStatus,
};

fn auth_response(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let (token, expires_at) = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;
    Ok(AuthResponse {
        token,
        expires_at: expires_at.to_rfc3339(),
        user,
    })
}

#[instrument(skip_all, fields(email = %req.email, role = %req.role))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Duplicate(format!(
            "An account with email {} already exists",
            email
        )));
    }

    let now = now_rfc3339();
    let user = User {
        id: new_id(),
        email,
        password_hash: hash_password(&req.password, state.config.auth.bcrypt_cost).await?,
        name: req.name.trim().to_string(),
        phone: req.phone.filter(|p| !p.trim().is_empty()),
        role: req.role,
        status: match req.role {
            Role::Doctor => UserStatus::Pending,
            _ => UserStatus::Active,
        },
        created_at: now.clone(),
        updated_at: now,
        last_login_at: None,
    };
    state
        .db
        .create_user(&user, req.specialization.as_deref())
        .await?;

    tracing::info!(user_id = %user.id, status = %user.status, "User registered");

    if user.role == Role::Doctor {
        let admins = state
            .db
            .list_users(&UserQuery {
                role: Some(Role::Admin),
                status: Some(UserStatus::Active),
                limit: Some(100),
                ..Default::default()
            })
            .await?;
        for admin in admins.items {
            notify(
                &state,
                &admin.id,
                NotificationKind::System,
                "New doctor awaiting approval",
                format!("{} registered as a doctor and is awaiting approval", user.name),
                Some(format!("/admin/doctors/{}", user.id)),
            )
            .await;
        }
    }

    let user = state.db.require_user(&user.id).await?;
    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

#[instrument(skip_all, fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let invalid = || AppError::unauthorized("Invalid email or password");

    let user = state
        .db
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash).await? {
        tracing::warn!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid());
    }
    if !user.status.can_sign_in() {
        tracing::warn!(user_id = %user.id, status = %user.status, "Login refused for locked account");
        return Err(AppError::Forbidden(format!("Account is {}", user.status)));
    }

    state.db.record_login(&user.id).await?;
    let user = state.db.require_user(&user.id).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(auth_response(&state, user)?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    Ok(Json(state.db.require_user(&auth.id).await?))
}

#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_password(&req.new_password)?;

    let user = state.db.require_user(&auth.id).await?;
    if !verify_password(&req.current_password, &user.password_hash).await? {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let hash = hash_password(&req.new_password, state.config.auth.bcrypt_cost).await?;
    state.db.update_password_hash(&auth.id, &hash).await?;

    tracing::info!("Password changed");
    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}
