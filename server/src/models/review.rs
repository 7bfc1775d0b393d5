use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

string_enum!(
    ReviewStatus {
        Visible => "visible",
        Hidden => "hidden",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub appointment_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub patient_id: String,
    pub patient_name: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub status: ReviewStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub appointment_id: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

pub const MAX_COMMENT_LEN: usize = 2000;

impl CreateReviewRequest {
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::validation("rating must be between 1 and 5"));
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_COMMENT_LEN {
                return Err(AppError::Validation(format!(
                    "comment must be at most {} characters",
                    MAX_COMMENT_LEN
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReviewStatusRequest {
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    pub status: Option<ReviewStatus>,
    pub doctor_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
