// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub survey_id: i64,

    /// The text content of the question.
    pub question_text: String,

    /// Question type tag, e.g. 'TEXT', 'SINGLE_CHOICE' or 'MULTIPLE_CHOICE'.
    /// Kept as an open string so clients can introduce new types without a
    /// schema change.
    pub question_type: String,

    /// Display position inside the survey. Assigned `count(existing) + 1`
    /// when the client does not supply one; never reassigned on deletion,
    /// so gaps are permitted.
    pub question_order: i64,
}

/// Represents the 'question_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
}

/// Question as embedded in survey payloads, options included.
#[derive(Debug, Serialize)]
pub struct QuestionDto {
    pub id: i64,
    pub question_text: String,
    pub question_type: String,
    pub question_order: i64,
    pub options: Vec<OptionDto>,
}

#[derive(Debug, Serialize)]
pub struct OptionDto {
    pub id: i64,
    pub option_text: String,
}

/// DTO for creating or updating a question.
///
/// On update, a present `options` list (even an empty one) replaces all
/// stored options for the question; an absent list leaves them untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionPayload {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    #[validate(length(min = 1, max = 32))]
    pub question_type: String,
    pub question_order: Option<i64>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<OptionPayload>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptionPayload {
    pub option_text: String,
}

fn validate_options(options: &[OptionPayload]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.option_text.is_empty() {
            return Err(validator::ValidationError::new("option_text_empty"));
        }
        if opt.option_text.len() > 500 {
            return Err(validator::ValidationError::new("option_text_too_long"));
        }
    }
    Ok(())
}
