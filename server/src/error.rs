//! Application error type and its HTTP mapping
//!
//! Every failure a handler or the store can produce is an [`AppError`]. Each variant maps
//! to a fixed HTTP status and a machine-readable code, rendered as an RFC 9457
//! problem document (https://www.rfc-editor.org/rfc/rfc9457.html).

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

const PROBLEM_TYPE_BASE: &str = "https://medibook.example.com/errors";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("'{0}' is not a valid id")]
    InvalidId(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    FileTooLarge(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidId(_) => StatusCode::BAD_REQUEST,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidId(_) => "INVALID_ID",
            AppError::Duplicate(_) => "DUPLICATE_ENTRY",
            AppError::FileTooLarge(_) => "FILE_TOO_LARGE",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::InvalidId(_) => "invalid-id",
            AppError::Duplicate(_) => "duplicate",
            AppError::FileTooLarge(_) => "file-too-large",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not-found",
            AppError::Internal(_) => "internal",
        }
    }

    /// Client-facing description; internal failures never leak their cause here
    fn public_detail(&self) -> String {
        match self {
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Problem document returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub code: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Error chain, only present in development mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl From<&AppError> for ProblemDetails {
    fn from(err: &AppError) -> Self {
        let status = err.status();
        Self {
            type_uri: format!("{}/{}", PROBLEM_TYPE_BASE, err.slug()),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            code: err.code().to_string(),
            success: false,
            detail: Some(err.public_detail()),
            instance: None,
            stack: None,
        }
    }
}

/// Debug rendering of the error, carried in response extensions so the
/// error-detail middleware can expose it in development mode
#[derive(Debug, Clone)]
pub struct ErrorStack(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, error_chain = ?e, "Request failed with internal error");
            }
            other => {
                tracing::debug!(code = other.code(), detail = %other, "Request rejected");
            }
        }

        let problem = ProblemDetails::from(&self);
        let mut response = (self.status(), Json(problem)).into_response();

        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
            .extensions_mut()
            .insert(ErrorStack(format!("{:?}", self)));

        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let fields = db_err
                    .message()
                    .split_once(':')
                    .map(|(_, fields)| fields.trim().to_string())
                    .unwrap_or_default();
                return AppError::Duplicate(format!("Duplicate value for {}", fields));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::Validation("Referenced record does not exist".to_string());
            }
        }
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("stored document is malformed"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::FileTooLarge("Request body exceeds the upload limit".to_string())
        } else {
            AppError::Validation(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let cases = [
            (AppError::validation("bad"), 400, "VALIDATION_ERROR"),
            (AppError::InvalidId("x".into()), 400, "INVALID_ID"),
            (AppError::Duplicate("dup".into()), 409, "DUPLICATE_ENTRY"),
            (AppError::FileTooLarge("big".into()), 413, "FILE_TOO_LARGE"),
            (AppError::unauthorized("no"), 401, "UNAUTHORIZED"),
            (AppError::forbidden("no"), 403, "FORBIDDEN"),
            (AppError::not_found("User"), 404, "NOT_FOUND"),
            (
                AppError::Internal(anyhow::anyhow!("boom")),
                500,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status, "status for {}", code);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_internal_detail_is_generic() {
        let err = AppError::Internal(anyhow::anyhow!("database file is locked"));
        let problem = ProblemDetails::from(&err);

        assert_eq!(problem.detail.as_deref(), Some("An unexpected error occurred"));
        assert!(problem.stack.is_none());
    }

    #[test]
    fn test_not_found_detail_names_resource() {
        let problem = ProblemDetails::from(&AppError::not_found("Appointment"));

        assert_eq!(problem.status, 404);
        assert_eq!(problem.title, "Not Found");
        assert_eq!(problem.detail.as_deref(), Some("Appointment not found"));
    }

    #[test]
    fn test_serialization() {
        let problem = ProblemDetails::from(&AppError::Duplicate("Duplicate value for users.email".into()));
        let json = serde_json::to_value(&problem).unwrap();

        assert_eq!(json["type"], "https://medibook.example.com/errors/duplicate");
        assert_eq!(json["title"], "Conflict");
        assert_eq!(json["status"], 409);
        assert_eq!(json["code"], "DUPLICATE_ENTRY");
        assert_eq!(json["success"], false);
        assert!(json.get("stack").is_none());
        assert!(json.get("instance").is_none());
    }

    #[test]
    fn test_response_carries_problem_content_type_and_stack_extension() {
        let response = AppError::validation("name is required").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
        assert!(response.extensions().get::<ErrorStack>().is_some());
    }
}
