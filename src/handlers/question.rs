// src/handlers/question.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::survey::require_owned_survey,
    models::question::{OptionDto, OptionPayload, Question, QuestionDto, QuestionPayload},
    utils::{html::clean_html, jwt::Claims},
};

const QUESTION_COLUMNS: &str = "id, survey_id, question_text, question_type, question_order";

pub(crate) async fn fetch_question(
    pool: &SqlitePool,
    question_id: i64,
) -> Result<Option<Question>, AppError> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
    ))
    .bind(question_id)
    .fetch_optional(pool)
    .await?;
    Ok(question)
}

/// Loads a question and enforces ownership of its parent survey.
pub(crate) async fn require_owned_question(
    pool: &SqlitePool,
    question_id: i64,
    username: &str,
    denied: &str,
) -> Result<Question, AppError> {
    let question = fetch_question(pool, question_id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let owner: String = sqlx::query_scalar(
        "SELECT u.username FROM surveys s JOIN users u ON u.id = s.created_by WHERE s.id = ?",
    )
    .bind(question.survey_id)
    .fetch_one(pool)
    .await?;

    if owner != username {
        return Err(AppError::Forbidden(denied.to_string()));
    }

    Ok(question)
}

pub(crate) async fn load_options(
    pool: &SqlitePool,
    question_id: i64,
) -> Result<Vec<OptionDto>, AppError> {
    let options = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, option_text FROM question_options WHERE question_id = ? ORDER BY id ASC",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await?;

    Ok(options
        .into_iter()
        .map(|(id, option_text)| OptionDto { id, option_text })
        .collect())
}

/// Questions of a survey in display order, options embedded.
pub(crate) async fn load_questions(
    pool: &SqlitePool,
    survey_id: i64,
) -> Result<Vec<QuestionDto>, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions \
         WHERE survey_id = ? ORDER BY question_order ASC"
    ))
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let mut dtos = Vec::with_capacity(questions.len());
    for question in questions {
        dtos.push(question_to_dto(pool, question).await?);
    }
    Ok(dtos)
}

pub(crate) async fn question_to_dto(
    pool: &SqlitePool,
    question: Question,
) -> Result<QuestionDto, AppError> {
    let options = load_options(pool, question.id).await?;
    Ok(QuestionDto {
        id: question.id,
        question_text: question.question_text,
        question_type: question.question_type,
        question_order: question.question_order,
        options,
    })
}

async fn insert_options<'a>(
    tx: &mut sqlx::Transaction<'a, sqlx::Sqlite>,
    question_id: i64,
    options: &[OptionPayload],
) -> Result<(), AppError> {
    for option in options {
        sqlx::query("INSERT INTO question_options (question_id, option_text) VALUES (?, ?)")
            .bind(question_id)
            .bind(clean_html(&option.option_text))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Adds a question to a survey. Owner only.
///
/// When the client does not pick a position, the question lands after the
/// existing ones (`count + 1`). Supplied options are stored in input order.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(survey_id): Path<i64>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    require_owned_survey(
        &pool,
        survey_id,
        &claims.sub,
        "Unauthorized to add questions to this survey",
    )
    .await?;

    let question_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE survey_id = ?")
            .bind(survey_id)
            .fetch_one(&pool)
            .await?;

    let question_order = payload.question_order.unwrap_or(question_count + 1);

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO questions (survey_id, question_text, question_type, question_order) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(survey_id)
    .bind(clean_html(&payload.question_text))
    .bind(&payload.question_type)
    .bind(question_order)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    let question_id = result.last_insert_rowid();

    if let Some(options) = &payload.options {
        insert_options(&mut tx, question_id, options).await?;
    }

    tx.commit().await?;

    let question = fetch_question(&pool, question_id)
        .await?
        .ok_or(AppError::InternalServerError(
            "Question vanished after insert".to_string(),
        ))?;

    Ok((
        StatusCode::CREATED,
        Json(question_to_dto(&pool, question).await?),
    ))
}

/// Updates a question. Owner only.
///
/// Text and type are always taken from the payload; the position only when
/// supplied. A supplied options list (even an empty one) replaces all stored
/// options; an absent list leaves them untouched.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(question_id): Path<i64>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = require_owned_question(
        &pool,
        question_id,
        &claims.sub,
        "Unauthorized to update this question",
    )
    .await?;

    let question_order = payload.question_order.unwrap_or(question.question_order);

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE questions SET question_text = ?, question_type = ?, question_order = ? \
         WHERE id = ?",
    )
    .bind(clean_html(&payload.question_text))
    .bind(&payload.question_type)
    .bind(question_order)
    .bind(question_id)
    .execute(&mut *tx)
    .await?;

    if let Some(options) = &payload.options {
        // Replace, not merge: wipe the old rows and insert the new list.
        sqlx::query("DELETE FROM question_options WHERE question_id = ?")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        insert_options(&mut tx, question_id, options).await?;
    }

    tx.commit().await?;

    let updated = fetch_question(&pool, question_id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question_to_dto(&pool, updated).await?))
}

/// Deletes a question. Owner only.
///
/// Cascades explicitly inside one transaction: answers referencing the
/// question go first, then its options, then the question row itself.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_owned_question(
        &pool,
        question_id,
        &claims.sub,
        "Unauthorized to delete this question",
    )
    .await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM answers WHERE question_id = ?")
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM question_options WHERE question_id = ?")
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a single option to a question. Owner only. No reordering.
pub async fn add_option(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(question_id): Path<i64>,
    Json(payload): Json<OptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.option_text.is_empty() || payload.option_text.len() > 500 {
        return Err(AppError::BadRequest(
            "Option text length must be between 1 and 500 characters.".to_string(),
        ));
    }

    require_owned_question(
        &pool,
        question_id,
        &claims.sub,
        "Unauthorized to add options to this question",
    )
    .await?;

    let result =
        sqlx::query("INSERT INTO question_options (question_id, option_text) VALUES (?, ?)")
            .bind(question_id)
            .bind(clean_html(&payload.option_text))
            .execute(&pool)
            .await?;

    let option = OptionDto {
        id: result.last_insert_rowid(),
        option_text: clean_html(&payload.option_text),
    };

    Ok((StatusCode::CREATED, Json(option)))
}

/// Questions of a survey in ascending display order. Public: both the owner
/// dashboard and the respondent rendering path use it.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_questions(&pool, survey_id).await?))
}
