// src/models/response.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'survey_responses' table in the database.
///
/// At most one response exists per (survey, respondent email) pair; the
/// handler pre-checks and the table carries a UNIQUE constraint as backstop.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: i64,
    pub survey_id: i64,
    pub respondent_email: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'answers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub survey_response_id: i64,
    pub question_id: i64,

    /// Free-text answer, stored verbatim.
    pub answer_text: Option<String>,

    /// Selected option ids, comma-joined decimal strings.
    /// NULL when the respondent selected nothing; never an empty string.
    pub selected_options: Option<String>,
}

/// Response as returned to the survey owner, answers embedded.
#[derive(Debug, Serialize)]
pub struct ResponseDto {
    pub id: i64,
    pub survey_id: i64,
    pub respondent_email: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub answers: Vec<AnswerDto>,
}

#[derive(Debug, Serialize)]
pub struct AnswerDto {
    pub id: i64,
    pub question_id: i64,
    pub answer_text: Option<String>,
    pub selected_option_ids: Vec<i64>,
}

/// A single submitted answer. Either free text, selected options, or both,
/// depending on the question type (the server does not cross-check).
#[derive(Debug, Deserialize)]
pub struct AnswerPayload {
    pub question_id: i64,
    pub answer_text: Option<String>,
    pub selected_option_ids: Option<Vec<i64>>,
}

/// DTO for a direct (non-token) submission.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResponseRequest {
    pub survey_id: i64,
    #[validate(email(message = "A valid respondent email is required."))]
    pub respondent_email: String,
    #[serde(default)]
    pub answers: Vec<AnswerPayload>,
}

/// DTO for a token-gated submission; the survey id comes from the token.
#[derive(Debug, Deserialize, Validate)]
pub struct PublicSubmitRequest {
    #[validate(email(message = "A valid respondent email is required."))]
    pub respondent_email: String,
    #[serde(default)]
    pub answers: Vec<AnswerPayload>,
}

/// Joins selected option ids into the stored representation.
///
/// An empty selection encodes to `None` so the column stays NULL; decoding
/// must never see an empty string.
pub fn encode_selected_options(ids: &[i64]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Inverse of [`encode_selected_options`]: splits the stored field and parses
/// each piece as an id. An absent or empty field yields an empty list.
pub fn decode_selected_options(raw: Option<&str>) -> Vec<i64> {
    match raw {
        Some(value) if !value.is_empty() => value
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_joins_ids_in_order() {
        assert_eq!(encode_selected_options(&[3, 1, 2]), Some("3,1,2".to_string()));
        assert_eq!(encode_selected_options(&[42]), Some("42".to_string()));
    }

    #[test]
    fn encode_empty_is_none() {
        assert_eq!(encode_selected_options(&[]), None);
    }

    #[test]
    fn decode_inverts_encode() {
        let ids = vec![7, 3, 11];
        let stored = encode_selected_options(&ids);
        assert_eq!(decode_selected_options(stored.as_deref()), ids);
    }

    #[test]
    fn decode_absent_and_empty_yield_no_ids() {
        assert!(decode_selected_options(None).is_empty());
        assert!(decode_selected_options(Some("")).is_empty());
    }

    #[test]
    fn decode_skips_garbage_pieces() {
        assert_eq!(decode_selected_options(Some("1,x,3")), vec![1, 3]);
    }
}
