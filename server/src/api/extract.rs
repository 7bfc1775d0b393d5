//! Request extractors: authenticated user, JSON bodies and query strings whose
//! rejections render as problem documents, and id parsing

use axum::{
    extract::{FromRequest, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::AppState;
use crate::auth::verify_token;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

/// JSON body extractor rejecting with [`AppError`]
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// Query string extractor rejecting with [`AppError`]
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Ids are UUIDs; anything else is rejected before touching the database
pub fn parse_id(raw: &str) -> AppResult<String> {
    uuid::Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| AppError::InvalidId(raw.to_string()))
}

/// The signed-in user behind a bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "This action is not available to {} accounts",
                self.role
            )))
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Resolve a token to a user that still exists and may sign in
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = verify_token(token, &state.config.auth.jwt_secret)?;
    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;

    if !user.status.can_sign_in() {
        return Err(AppError::Forbidden(format!("Account is {}", user.status)));
    }
    Ok(AuthUser::from(&user))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

        authenticate(state, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = "3f2b8c1e-9a4d-4e6f-8b7a-1c2d3e4f5a6b";
        assert_eq!(parse_id(id).unwrap(), id);
        assert_eq!(parse_id("42").unwrap_err().code(), "INVALID_ID");
    }

    #[test]
    fn test_require_role() {
        let user = AuthUser {
            id: "u1".to_string(),
            name: "Pat".to_string(),
            role: Role::Patient,
        };
        assert!(user.require_role(&[Role::Patient, Role::Doctor]).is_ok());
        assert_eq!(
            user.require_role(&[Role::Admin]).unwrap_err().code(),
            "FORBIDDEN"
        );
    }
}
