// src/models/survey.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::question::QuestionDto;

/// Represents the 'surveys' table in the database.
///
/// `is_active` doubles as the lifecycle flag: a freshly created survey is
/// active, soft deletion clears the flag and publishing sets it again. There
/// is no separate "deleted" state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,

    pub title: String,

    pub description: Option<String>,

    /// Owning user id. Immutable after creation.
    pub created_by: i64,

    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Survey as returned to clients, with owner name and ordered questions.
#[derive(Debug, Serialize)]
pub struct SurveyDto {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_by_username: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<QuestionDto>,
}

/// DTO for creating a survey.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSurveyRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title length must be between 1 and 255 characters."
    ))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// DTO for updating a survey. Absent fields leave the stored values
/// unchanged; `is_active` is applied verbatim when present.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSurveyRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}
