// src/utils/mailer.rs

use serde_json::json;

use crate::config::Config;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Outbound email via the Resend HTTP API.
///
/// Delivery is fire-and-forget: each send runs in a spawned task and failures
/// are logged, never propagated. Registration and password reset must succeed
/// whether or not the email goes out. When no API key is configured the
/// mailer only logs, which keeps local runs and tests offline.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
    frontend_base_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.resend_api_key.clone(),
            from: config.mail_from.clone(),
            frontend_base_url: config.frontend_base_url.clone(),
        }
    }

    pub fn send_verification_email(&self, to: &str, token: &str) {
        let url = format!(
            "{}/auth/verify-email?token={}",
            self.frontend_base_url, token
        );
        let html = format!(
            "<p>Welcome to Surveyer!</p>\
             <p>Please <a href=\"{url}\">verify your email address</a> to activate your account.</p>\
             <p>This link expires in 24 hours.</p>"
        );
        self.dispatch(to, "Verify Your Email Address", html);
    }

    pub fn send_password_reset_email(&self, to: &str, token: &str) {
        let url = format!(
            "{}/auth/reset-password?token={}",
            self.frontend_base_url, token
        );
        let html = format!(
            "<p>We received a request to reset your password.</p>\
             <p><a href=\"{url}\">Choose a new password</a>. \
             If you did not ask for this, ignore this email.</p>\
             <p>This link expires in 1 hour.</p>"
        );
        self.dispatch(to, "Reset Your Password", html);
    }

    /// Spawns the actual send so the calling handler never waits on (or fails
    /// because of) the email provider.
    fn dispatch(&self, to: &str, subject: &str, html: String) {
        let Some(api_key) = self.api_key.clone() else {
            tracing::info!("Mailer disabled, skipping '{}' to {}", subject, to);
            return;
        };

        let client = self.client.clone();
        let from = self.from.clone();
        let to = to.to_owned();
        let subject = subject.to_owned();

        tokio::spawn(async move {
            let body = json!({
                "from": from,
                "to": to,
                "subject": subject,
                "html": html,
            });

            let result = client
                .post(RESEND_API_URL)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("Email '{}' sent to {}", subject, to);
                }
                Ok(resp) => {
                    tracing::warn!(
                        "Email '{}' to {} rejected with status {}",
                        subject,
                        to,
                        resp.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to send email '{}' to {}: {}", subject, to, e);
                }
            }
        });
    }
}
