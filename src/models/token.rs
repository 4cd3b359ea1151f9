// src/models/token.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Represents the 'survey_tokens' table in the database.
///
/// An opaque bearer string granting public read/submit access to exactly one
/// survey. Tokens are invalidated by revocation or expiry, never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SurveyToken {
    pub id: i64,

    /// Globally unique opaque token string.
    pub token: String,

    pub survey_id: i64,

    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Expiry timestamp, checked lazily on each validation.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Token as returned to the issuing owner.
#[derive(Debug, Serialize)]
pub struct TokenDto {
    pub token: String,
    pub survey_id: i64,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
