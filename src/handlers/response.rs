// src/handlers/response.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{question::require_owned_question, survey},
    models::response::{
        Answer, AnswerDto, AnswerPayload, ResponseDto, SubmitResponseRequest, SurveyResponse,
        decode_selected_options, encode_selected_options,
    },
    utils::jwt::Claims,
};

const RESPONSE_COLUMNS: &str = "id, survey_id, respondent_email, submitted_at";
const ANSWER_COLUMNS: &str = "id, survey_response_id, question_id, answer_text, selected_options";

fn answer_to_dto(answer: Answer) -> AnswerDto {
    let selected_option_ids = decode_selected_options(answer.selected_options.as_deref());
    AnswerDto {
        id: answer.id,
        question_id: answer.question_id,
        answer_text: answer.answer_text,
        selected_option_ids,
    }
}

async fn load_answers(
    pool: &SqlitePool,
    response_id: i64,
) -> Result<Vec<AnswerDto>, AppError> {
    let answers = sqlx::query_as::<_, Answer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE survey_response_id = ? ORDER BY id ASC"
    ))
    .bind(response_id)
    .fetch_all(pool)
    .await?;

    Ok(answers.into_iter().map(answer_to_dto).collect())
}

async fn response_to_dto(
    pool: &SqlitePool,
    response: SurveyResponse,
) -> Result<ResponseDto, AppError> {
    let answers = load_answers(pool, response.id).await?;
    Ok(ResponseDto {
        id: response.id,
        survey_id: response.survey_id,
        respondent_email: response.respondent_email,
        submitted_at: response.submitted_at,
        answers,
    })
}

/// Core submission path, shared by the direct endpoint and the token-gated
/// one. Inserts the response and its answers in a single transaction.
///
/// Answers referencing a question that does not exist are dropped without
/// surfacing a partial failure; everything else commits or nothing does.
pub(crate) async fn insert_response(
    pool: &SqlitePool,
    survey_id: i64,
    respondent_email: &str,
    answers: &[AnswerPayload],
) -> Result<ResponseDto, AppError> {
    // Submissions against unpublished surveys look exactly like submissions
    // against missing ones.
    survey::fetch_active_survey(pool, survey_id)
        .await?
        .ok_or(AppError::NotFound(
            "Survey not found or inactive".to_string(),
        ))?;

    let already_submitted: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM survey_responses WHERE survey_id = ? AND respondent_email = ?",
    )
    .bind(survey_id)
    .bind(respondent_email)
    .fetch_one(pool)
    .await?;

    if already_submitted > 0 {
        return Err(AppError::Conflict(
            "Response already submitted for this email".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO survey_responses (survey_id, respondent_email, submitted_at) \
         VALUES (?, ?, ?)",
    )
    .bind(survey_id)
    .bind(respondent_email)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        // Concurrent duplicate submissions slip past the pre-check and land
        // on the (survey_id, respondent_email) unique index instead.
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict("Response already submitted for this email".to_string())
        } else {
            tracing::error!("Failed to insert response: {:?}", e);
            AppError::from(e)
        }
    })?;

    let response_id = result.last_insert_rowid();

    for answer in answers {
        let question_exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE id = ?")
                .bind(answer.question_id)
                .fetch_one(&mut *tx)
                .await?;
        if question_exists == 0 {
            tracing::warn!(
                "Dropping answer for unknown question {} on survey {}",
                answer.question_id,
                survey_id
            );
            continue;
        }

        let selected_options =
            encode_selected_options(answer.selected_option_ids.as_deref().unwrap_or(&[]));

        sqlx::query(
            "INSERT INTO answers (survey_response_id, question_id, answer_text, selected_options) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(response_id)
        .bind(answer.question_id)
        .bind(&answer.answer_text)
        .bind(&selected_options)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let response = sqlx::query_as::<_, SurveyResponse>(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM survey_responses WHERE id = ?"
    ))
    .bind(response_id)
    .fetch_one(pool)
    .await?;

    response_to_dto(pool, response).await
}

/// Accepts a filled-in response against a published survey.
/// Public: respondents identify themselves only by email.
pub async fn submit_response(
    State(pool): State<SqlitePool>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let dto = insert_response(
        &pool,
        payload.survey_id,
        &payload.respondent_email,
        &payload.answers,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

/// All responses for a survey, newest first. Owner only.
pub async fn list_by_survey(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    survey::require_owned_survey(
        &pool,
        survey_id,
        &claims.sub,
        "Unauthorized to view responses for this survey",
    )
    .await?;

    let responses = sqlx::query_as::<_, SurveyResponse>(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM survey_responses WHERE survey_id = ? ORDER BY id DESC"
    ))
    .bind(survey_id)
    .fetch_all(&pool)
    .await?;

    let mut dtos = Vec::with_capacity(responses.len());
    for response in responses {
        dtos.push(response_to_dto(&pool, response).await?);
    }

    Ok(Json(dtos))
}

/// A single response by id. Owner of the parent survey only.
///
/// A missing response is 404 — distinguishable from "exists but belongs to
/// someone else's survey", which is 403.
pub async fn get_response(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(response_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let response = sqlx::query_as::<_, SurveyResponse>(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM survey_responses WHERE id = ?"
    ))
    .bind(response_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Response not found".to_string()))?;

    let owner: String = sqlx::query_scalar(
        "SELECT u.username FROM surveys s JOIN users u ON u.id = s.created_by WHERE s.id = ?",
    )
    .bind(response.survey_id)
    .fetch_one(&pool)
    .await?;

    if owner != claims.sub {
        return Err(AppError::Forbidden(
            "Unauthorized to view this response".to_string(),
        ));
    }

    Ok(Json(response_to_dto(&pool, response).await?))
}

/// Total submitted responses for a survey. Public, no authorization.
pub async fn response_count(
    State(pool): State<SqlitePool>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM survey_responses WHERE survey_id = ?")
            .bind(survey_id)
            .fetch_one(&pool)
            .await?;

    Ok(Json(count))
}

/// All answers recorded for one question, selections decoded. Owner only.
pub async fn answers_by_question(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_owned_question(
        &pool,
        question_id,
        &claims.sub,
        "Unauthorized to view answers for this question",
    )
    .await?;

    let answers = sqlx::query_as::<_, Answer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE question_id = ? ORDER BY id ASC"
    ))
    .bind(question_id)
    .fetch_all(&pool)
    .await?;

    let dtos: Vec<AnswerDto> = answers.into_iter().map(answer_to_dto).collect();

    Ok(Json(dtos))
}
