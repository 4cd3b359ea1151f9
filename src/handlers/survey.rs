// src/handlers/survey.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::question,
    models::survey::{CreateSurveyRequest, Survey, SurveyDto, UpdateSurveyRequest},
    utils::{html::clean_html, jwt::Claims},
};

pub(crate) const SURVEY_COLUMNS: &str =
    "id, title, description, created_by, is_active, created_at";

pub(crate) async fn fetch_survey(
    pool: &SqlitePool,
    survey_id: i64,
) -> Result<Option<Survey>, AppError> {
    let survey = sqlx::query_as::<_, Survey>(&format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = ?"
    ))
    .bind(survey_id)
    .fetch_optional(pool)
    .await?;
    Ok(survey)
}

/// Lookup used by every public path: inactive surveys are indistinguishable
/// from nonexistent ones.
pub(crate) async fn fetch_active_survey(
    pool: &SqlitePool,
    survey_id: i64,
) -> Result<Option<Survey>, AppError> {
    let survey = sqlx::query_as::<_, Survey>(&format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = ? AND is_active = 1"
    ))
    .bind(survey_id)
    .fetch_optional(pool)
    .await?;
    Ok(survey)
}

/// Loads a survey and enforces the ownership rule: the caller's principal
/// name must match the owner's username exactly, otherwise the operation
/// fails with 403 rather than being silently filtered.
pub(crate) async fn require_owned_survey(
    pool: &SqlitePool,
    survey_id: i64,
    username: &str,
    denied: &str,
) -> Result<Survey, AppError> {
    let survey = fetch_survey(pool, survey_id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    let owner: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
        .bind(survey.created_by)
        .fetch_one(pool)
        .await?;

    if owner != username {
        return Err(AppError::Forbidden(denied.to_string()));
    }

    Ok(survey)
}

/// Assembles the client-facing shape: owner name plus ordered questions with
/// their options.
pub(crate) async fn to_dto(pool: &SqlitePool, survey: Survey) -> Result<SurveyDto, AppError> {
    let created_by_username: String =
        sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
            .bind(survey.created_by)
            .fetch_one(pool)
            .await?;

    let questions = question::load_questions(pool, survey.id).await?;

    Ok(SurveyDto {
        id: survey.id,
        title: survey.title,
        description: survey.description,
        created_by_username,
        is_active: survey.is_active,
        created_at: survey.created_at,
        questions,
    })
}

async fn to_dtos(pool: &SqlitePool, surveys: Vec<Survey>) -> Result<Vec<SurveyDto>, AppError> {
    let mut dtos = Vec::with_capacity(surveys.len());
    for survey in surveys {
        dtos.push(to_dto(pool, survey).await?);
    }
    Ok(dtos)
}

/// Lists all published surveys, newest first.
pub async fn list_surveys(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let surveys = sqlx::query_as::<_, Survey>(&format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys WHERE is_active = 1 ORDER BY id DESC"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(to_dtos(&pool, surveys).await?))
}

/// Lists the caller's own surveys, newest first, drafts and deleted included.
pub async fn my_surveys(
    State(pool): State<SqlitePool>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let surveys = sqlx::query_as::<_, Survey>(&format!(
        "SELECT {SURVEY_COLUMNS} FROM surveys \
         WHERE created_by = (SELECT id FROM users WHERE username = ?) \
         ORDER BY id DESC"
    ))
    .bind(&claims.sub)
    .fetch_all(&pool)
    .await?;

    Ok(Json(to_dtos(&pool, surveys).await?))
}

/// Retrieves a single survey by ID (owner dashboard path, any state).
pub async fn get_survey(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_survey(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    Ok(Json(to_dto(&pool, survey).await?))
}

/// Retrieves a single survey by ID for respondents; active surveys only.
pub async fn get_public_survey(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_active_survey(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    Ok(Json(to_dto(&pool, survey).await?))
}

/// Creates a new survey owned by the caller. Starts active with no
/// questions; publishing only matters after a soft delete or while editing
/// with `is_active` toggled off.
pub async fn create_survey(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let owner_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(&claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let title = clean_html(&payload.title);
    let description = payload.description.as_deref().map(clean_html);

    let result = sqlx::query(
        "INSERT INTO surveys (title, description, created_by, is_active, created_at) \
         VALUES (?, ?, ?, 1, ?)",
    )
    .bind(&title)
    .bind(&description)
    .bind(owner_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create survey: {:?}", e);
        AppError::from(e)
    })?;

    let survey = fetch_survey(&pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::InternalServerError(
            "Survey vanished after insert".to_string(),
        ))?;

    Ok((StatusCode::CREATED, Json(to_dto(&pool, survey).await?)))
}

/// Updates a survey. Owner only. Absent fields keep their stored values;
/// `is_active` is applied verbatim when present.
pub async fn update_survey(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let survey =
        require_owned_survey(&pool, id, &claims.sub, "Unauthorized to update this survey").await?;

    if payload.title.is_none() && payload.description.is_none() && payload.is_active.is_none() {
        return Ok(Json(to_dto(&pool, survey).await?));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE surveys SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(clean_html(&title));
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update survey: {:?}", e);
        AppError::from(e)
    })?;

    let updated = fetch_survey(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    Ok(Json(to_dto(&pool, updated).await?))
}

/// Soft-deletes a survey by clearing its active flag. Owner only.
/// No rows are removed; publishing later brings the survey back.
pub async fn delete_survey(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_owned_survey(&pool, id, &claims.sub, "Unauthorized to delete this survey").await?;

    sqlx::query("UPDATE surveys SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete survey: {:?}", e);
            AppError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Publishes a survey (or reactivates a soft-deleted one; the flag does not
/// distinguish the two). Owner only. A survey with no questions cannot be
/// published.
pub async fn publish_survey(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_owned_survey(&pool, id, &claims.sub, "Unauthorized to publish this survey").await?;

    let question_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE survey_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await?;

    if question_count == 0 {
        return Err(AppError::InvalidState(
            "Cannot publish survey without questions".to_string(),
        ));
    }

    sqlx::query("UPDATE surveys SET is_active = 1 WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    let published = fetch_survey(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    Ok(Json(to_dto(&pool, published).await?))
}

/// Number of surveys owned by the caller.
pub async fn survey_count(
    State(pool): State<SqlitePool>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM surveys \
         WHERE created_by = (SELECT id FROM users WHERE username = ?)",
    )
    .bind(&claims.sub)
    .fetch_one(&pool)
    .await?;

    Ok(Json(count))
}
