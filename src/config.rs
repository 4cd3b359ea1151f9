// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Length of generated survey access tokens.
pub const SURVEY_TOKEN_LENGTH: usize = 32;

/// Default lifetime of a survey access token, in days.
pub const SURVEY_TOKEN_TTL_DAYS: i64 = 30;

/// Lifetime of an email verification token, in hours.
pub const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;

/// Lifetime of a password reset token, in hours.
pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Resend API key. Outbound email is disabled when absent.
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    /// Base URL used to build verification / reset links in emails.
    pub frontend_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(604_800); // 7 days

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let resend_api_key = env::var("RESEND_API_KEY").ok();

        let mail_from =
            env::var("MAIL_FROM").unwrap_or_else(|_| "surveyer@localhost".to_string());

        let frontend_base_url = env::var("FRONTEND_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            resend_api_key,
            mail_from,
            frontend_base_url,
        }
    }
}
