// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::{Config, EMAIL_VERIFICATION_TTL_HOURS, PASSWORD_RESET_TTL_HOURS},
    error::AppError,
    models::user::{
        ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, User,
        VerifyEmailParams,
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
        mailer::Mailer,
        token::generate_token,
    },
};

const USER_COLUMNS: &str = "id, username, email, name, password, role, is_email_verified, \
     email_verification_token, verification_token_expiry, \
     password_reset_token, password_reset_token_expiry, created_at";

async fn fetch_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it, then sends the email
/// verification link. Email delivery is fire-and-forget: a mailer failure is
/// logged inside the mailer and never fails the registration.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    State(mailer): State<Mailer>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let username = payload.username.to_lowercase();

    if fetch_user_by_username(&pool, &username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let email_taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&payload.email)
        .fetch_one(&pool)
        .await?;
    if email_taken > 0 {
        return Err(AppError::Conflict(
            "Email is already registered".to_string(),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;
    let verification_token = generate_token(32);
    let token_expiry = Utc::now() + Duration::hours(EMAIL_VERIFICATION_TTL_HOURS);

    let result = sqlx::query(
        "INSERT INTO users \
         (username, email, name, password, role, is_email_verified, \
          email_verification_token, verification_token_expiry, created_at) \
         VALUES (?, ?, ?, ?, 'creator', 0, ?, ?, ?)",
    )
    .bind(&username)
    .bind(&payload.email)
    .bind(&payload.name)
    .bind(&hashed_password)
    .bind(&verification_token)
    .bind(token_expiry)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        // Races with a concurrent registration land here via the unique index.
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict("Username or email already registered".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    let user_id = result.last_insert_rowid();
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    mailer.send_verification_email(&user.email, &verification_token);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully. Please check your email to verify your account.",
            "user": user,
        })),
    ))
}

/// Confirms an email address from the link sent at registration.
pub async fn verify_email(
    State(pool): State<SqlitePool>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.token.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Verification token is required".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email_verification_token = ?"
    ))
    .bind(&params.token)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::BadRequest(
        "Invalid verification token".to_string(),
    ))?;

    match user.verification_token_expiry {
        Some(expiry) if expiry > Utc::now() => {}
        _ => {
            return Err(AppError::BadRequest(
                "Verification token has expired".to_string(),
            ));
        }
    }

    if user.is_email_verified {
        return Err(AppError::BadRequest(
            "Email is already verified".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE users SET is_email_verified = 1, \
         email_verification_token = NULL, verification_token_expiry = NULL \
         WHERE id = ?",
    )
    .bind(user.id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

/// Authenticates a user and returns a JWT token.
///
/// Verifies the username and password against the database and rejects
/// accounts that have not confirmed their email yet.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = fetch_user_by_username(&pool, &payload.username.to_lowercase())
        .await?
        .ok_or(AppError::AuthError("Invalid credentials".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;
    if !is_valid {
        return Err(AppError::AuthError("Invalid credentials".to_string()));
    }

    if !user.is_email_verified {
        return Err(AppError::AuthError(
            "Please verify your email before logging in".to_string(),
        ));
    }

    let token = sign_jwt(
        &user.username,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user,
    })))
}

/// Starts the password reset flow.
///
/// Always answers with the same generic message so the endpoint cannot be
/// used to probe which emails are registered.
pub async fn forgot_password(
    State(pool): State<SqlitePool>,
    State(mailer): State<Mailer>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let generic = json!({
        "message": "If an account with that email exists, a password reset link has been sent."
    });

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await?;

    let Some(user) = user else {
        return Ok(Json(generic));
    };

    let reset_token = generate_token(32);
    let token_expiry = Utc::now() + Duration::hours(PASSWORD_RESET_TTL_HOURS);

    sqlx::query(
        "UPDATE users SET password_reset_token = ?, password_reset_token_expiry = ? WHERE id = ?",
    )
    .bind(&reset_token)
    .bind(token_expiry)
    .bind(user.id)
    .execute(&pool)
    .await?;

    mailer.send_password_reset_email(&user.email, &reset_token);

    Ok(Json(generic))
}

/// Completes the password reset flow with the emailed token.
pub async fn reset_password(
    State(pool): State<SqlitePool>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE password_reset_token = ?"
    ))
    .bind(&payload.token)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::BadRequest("Invalid reset token".to_string()))?;

    match user.password_reset_token_expiry {
        Some(expiry) if expiry > Utc::now() => {}
        _ => {
            return Err(AppError::BadRequest(
                "Reset token has expired".to_string(),
            ));
        }
    }

    let hashed_password = hash_password(&payload.new_password)?;

    sqlx::query(
        "UPDATE users SET password = ?, \
         password_reset_token = NULL, password_reset_token_expiry = NULL \
         WHERE id = ?",
    )
    .bind(&hashed_password)
    .bind(user.id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "message": "Password reset successfully" })))
}
