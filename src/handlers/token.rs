// src/handlers/token.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::{SURVEY_TOKEN_LENGTH, SURVEY_TOKEN_TTL_DAYS},
    error::AppError,
    handlers::{response::insert_response, survey},
    models::response::PublicSubmitRequest,
    models::token::{SurveyToken, TokenDto},
    utils::{jwt::Claims, token::generate_token},
};

const TOKEN_COLUMNS: &str = "id, token, survey_id, is_active, created_at, expires_at";

/// Resolves a token string to its row iff the token is active and unexpired.
/// Expiry is evaluated lazily here on every access; nothing sweeps expired
/// rows in the background.
pub(crate) async fn validate_token(
    pool: &SqlitePool,
    token: &str,
) -> Result<SurveyToken, AppError> {
    let row = sqlx::query_as::<_, SurveyToken>(&format!(
        "SELECT {TOKEN_COLUMNS} FROM survey_tokens WHERE token = ? AND is_active = 1"
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidToken(
        "Invalid or expired survey token".to_string(),
    ))?;

    if row.expires_at <= Utc::now() {
        return Err(AppError::InvalidToken(
            "Invalid or expired survey token".to_string(),
        ));
    }

    Ok(row)
}

/// Issues a share token for a survey. Owner only; the survey must be active.
///
/// Idempotent: while an active, unexpired token exists it is returned
/// unchanged, so repeated calls hand out the same link. Otherwise a fresh
/// token is generated, re-rolling on the (negligible) chance of a collision
/// with any previously stored token.
pub async fn issue_token(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = survey::require_owned_survey(
        &pool,
        survey_id,
        &claims.sub,
        "Unauthorized to generate a token for this survey",
    )
    .await?;

    if !survey.is_active {
        return Err(AppError::InvalidState(
            "Cannot generate token for inactive survey".to_string(),
        ));
    }

    let existing = sqlx::query_as::<_, SurveyToken>(&format!(
        "SELECT {TOKEN_COLUMNS} FROM survey_tokens \
         WHERE survey_id = ? ORDER BY id DESC LIMIT 1"
    ))
    .bind(survey_id)
    .fetch_optional(&pool)
    .await?;

    if let Some(token) = existing {
        if token.is_active && token.expires_at > Utc::now() {
            return Ok((
                StatusCode::OK,
                Json(TokenDto {
                    token: token.token,
                    survey_id: token.survey_id,
                    expires_at: token.expires_at,
                }),
            ));
        }
    }

    let token_string = loop {
        let candidate = generate_token(SURVEY_TOKEN_LENGTH);
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM survey_tokens WHERE token = ?")
            .bind(&candidate)
            .fetch_one(&pool)
            .await?;
        if taken == 0 {
            break candidate;
        }
    };

    let created_at = Utc::now();
    let expires_at = created_at + Duration::days(SURVEY_TOKEN_TTL_DAYS);

    sqlx::query(
        "INSERT INTO survey_tokens (token, survey_id, is_active, created_at, expires_at) \
         VALUES (?, ?, 1, ?, ?)",
    )
    .bind(&token_string)
    .bind(survey_id)
    .bind(created_at)
    .bind(expires_at)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store survey token: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(TokenDto {
            token: token_string,
            survey_id,
            expires_at,
        }),
    ))
}

/// Resolves a token to its survey for public rendering.
///
/// The token may outlive the survey's deactivation, so the survey's own
/// active flag is re-checked here.
pub async fn get_survey_by_token(
    State(pool): State<SqlitePool>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let token_row = validate_token(&pool, &token).await?;

    let survey = survey::fetch_active_survey(&pool, token_row.survey_id)
        .await?
        .ok_or(AppError::NotFound(
            "Survey not found or inactive".to_string(),
        ))?;

    Ok(Json(survey::to_dto(&pool, survey).await?))
}

/// Token-gated submission: the only write path open to unauthenticated
/// respondents. The survey id comes from the token, never the body.
pub async fn respond_via_token(
    State(pool): State<SqlitePool>,
    Path(token): Path<String>,
    Json(payload): Json<PublicSubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let token_row = validate_token(&pool, &token).await?;

    let dto = insert_response(
        &pool,
        token_row.survey_id,
        &payload.respondent_email,
        &payload.answers,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// Revokes a token. Owner of the token's survey only. Idempotent: revoking
/// an already-revoked token succeeds; rows are never deleted.
pub async fn revoke_token(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let token_row = sqlx::query_as::<_, SurveyToken>(&format!(
        "SELECT {TOKEN_COLUMNS} FROM survey_tokens WHERE token = ?"
    ))
    .bind(&token)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Token not found".to_string()))?;

    let owner: String = sqlx::query_scalar(
        "SELECT u.username FROM surveys s JOIN users u ON u.id = s.created_by WHERE s.id = ?",
    )
    .bind(token_row.survey_id)
    .fetch_one(&pool)
    .await?;

    if owner != claims.sub {
        return Err(AppError::Forbidden(
            "Unauthorized to deactivate this token".to_string(),
        ));
    }

    sqlx::query("UPDATE survey_tokens SET is_active = 0 WHERE id = ?")
        .bind(token_row.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
