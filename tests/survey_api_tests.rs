// tests/survey_api_tests.rs

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use surveyer::{config::Config, routes, state::AppState, utils::mailer::Mailer};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL and the database pool.
///
/// The database is a single-connection in-memory SQLite, shared between the
/// app under test and the test body for seeding and inspection.
async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        resend_api_key: None, // mailer logs instead of sending
        mail_from: "test@localhost".to_string(),
        frontend_base_url: "http://localhost:3000".to_string(),
    };

    let mailer = Mailer::from_config(&config);
    let state = AppState {
        pool: pool.clone(),
        config,
        mailer,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers a user, verifies their email via the emailed token (read
/// straight from the database) and logs in. Returns the Bearer token.
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    pool: &SqlitePool,
    username: &str,
) -> String {
    let email = format!("{}@example.com", username);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "name": "Test User",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let verification_token: String =
        sqlx::query_scalar("SELECT email_verification_token FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await
            .expect("Verification token missing");

    let response = client
        .get(format!(
            "{}/api/auth/verify-email?token={}",
            address, verification_token
        ))
        .send()
        .await
        .expect("Verify failed");
    assert_eq!(response.status().as_u16(), 200);

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login_resp["token"]
        .as_str()
        .expect("Token not found")
        .to_string()
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "email": "yo@example.com",
            "name": "Yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_username_conflicts() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("dup");

    for (i, expected) in [(0, 201u16), (1, 409u16)] {
        let response = client
            .post(format!("{}/api/auth/register", address))
            .json(&serde_json::json!({
                "username": username,
                "email": format!("dup{}@example.com", i),
                "name": "Dup",
                "password": "password123"
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), expected);
    }
}

#[tokio::test]
async fn login_requires_verified_email() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("unv");

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "name": "Unverified",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Login before verification is rejected
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // After verification it works
    let token: String =
        sqlx::query_scalar("SELECT email_verification_token FROM users WHERE username = ?")
            .bind(&username)
            .fetch_one(&pool)
            .await
            .unwrap();
    let response = client
        .get(format!("{}/api/auth/verify-email?token={}", address, token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn create_survey_requires_auth() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/surveys", address))
        .json(&serde_json::json!({ "title": "No auth" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn survey_lifecycle_flow() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("alice");
    let token = register_and_login(&client, &address, &pool, &username).await;

    // Create
    let survey: serde_json::Value = client
        .post(format!("{}/api/surveys", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Team Retro",
            "description": "Quarterly retrospective"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();
    assert_eq!(survey["is_active"], true);
    assert_eq!(survey["created_by_username"], username);
    assert_eq!(survey["questions"].as_array().unwrap().len(), 0);

    // Partial update: only the title changes, description survives
    let updated: serde_json::Value = client
        .put(format!("{}/api/surveys/{}", address, survey_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Team Retro 2026" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["title"], "Team Retro 2026");
    assert_eq!(updated["description"], "Quarterly retrospective");

    // Publishing without questions is rejected
    let response = client
        .post(format!("{}/api/surveys/{}/publish", address, survey_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    // Add a question, then publishing succeeds
    let response = client
        .post(format!("{}/api/questions/survey/{}", address, survey_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "question_text": "What went well?",
            "question_type": "TEXT"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Soft delete hides the survey from the public list
    let response = client
        .delete(format!("{}/api/surveys/{}", address, survey_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let public: Vec<serde_json::Value> = client
        .get(format!("{}/api/surveys", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public.iter().all(|s| s["id"].as_i64() != Some(survey_id)));

    // Public fetch of a deactivated survey is a 404
    let response = client
        .get(format!("{}/api/surveys/{}/public", address, survey_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Publish reactivates it (same flag, same operation)
    let published: serde_json::Value = client
        .post(format!("{}/api/surveys/{}/publish", address, survey_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(published["is_active"], true);

    // It is back in the public list, and still owned by the caller
    let public: Vec<serde_json::Value> = client
        .get(format!("{}/api/surveys", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public.iter().any(|s| s["id"].as_i64() == Some(survey_id)));

    let count: i64 = client
        .get(format!("{}/api/surveys/count", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn question_order_defaults_to_append() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("order");
    let token = register_and_login(&client, &address, &pool, &username).await;

    let survey: serde_json::Value = client
        .post(format!("{}/api/surveys", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Ordering" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();

    for text in ["First", "Second", "Third"] {
        let response = client
            .post(format!("{}/api/questions/survey/{}", address, survey_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "question_text": text,
                "question_type": "TEXT"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let questions: Vec<serde_json::Value> = client
        .get(format!("{}/api/questions/survey/{}", address, survey_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let orders: Vec<i64> = questions
        .iter()
        .map(|q| q["question_order"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(questions[0]["question_text"], "First");
    assert_eq!(questions[2]["question_text"], "Third");
}

#[tokio::test]
async fn update_question_replaces_options_only_when_supplied() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("opts");
    let token = register_and_login(&client, &address, &pool, &username).await;

    let survey: serde_json::Value = client
        .post(format!("{}/api/surveys", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Options" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();

    let question: serde_json::Value = client
        .post(format!("{}/api/questions/survey/{}", address, survey_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "question_text": "Pick one",
            "question_type": "SINGLE_CHOICE",
            "options": [
                { "option_text": "Alpha" },
                { "option_text": "Beta" }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = question["id"].as_i64().unwrap();
    assert_eq!(question["options"].as_array().unwrap().len(), 2);

    // Update without an options field: options untouched
    let updated: serde_json::Value = client
        .put(format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "question_text": "Pick exactly one",
            "question_type": "SINGLE_CHOICE"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["options"].as_array().unwrap().len(), 2);

    // Update with a one-element list: delete-then-insert, not a merge
    let updated: serde_json::Value = client
        .put(format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "question_text": "Pick exactly one",
            "question_type": "SINGLE_CHOICE",
            "options": [ { "option_text": "Gamma" } ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let options = updated["options"].as_array().unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0]["option_text"], "Gamma");

    // Update with an empty list wipes them
    let updated: serde_json::Value = client
        .put(format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "question_text": "Pick exactly one",
            "question_type": "SINGLE_CHOICE",
            "options": []
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["options"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn mutating_operations_reject_non_owner() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = unique_name("owner");
    let intruder = unique_name("intr");
    let owner_token = register_and_login(&client, &address, &pool, &owner).await;
    let intruder_token = register_and_login(&client, &address, &pool, &intruder).await;

    let survey: serde_json::Value = client
        .post(format!("{}/api/surveys", address))
        .bearer_auth(&owner_token)
        .json(&serde_json::json!({ "title": "Private" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();

    let question: serde_json::Value = client
        .post(format!("{}/api/questions/survey/{}", address, survey_id))
        .bearer_auth(&owner_token)
        .json(&serde_json::json!({
            "question_text": "Owned question",
            "question_type": "TEXT"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = question["id"].as_i64().unwrap();

    // Every mutating operation fails with 403 for a non-owner
    let update = client
        .put(format!("{}/api/surveys/{}", address, survey_id))
        .bearer_auth(&intruder_token)
        .json(&serde_json::json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 403);

    let delete = client
        .delete(format!("{}/api/surveys/{}", address, survey_id))
        .bearer_auth(&intruder_token)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 403);

    let publish = client
        .post(format!("{}/api/surveys/{}/publish", address, survey_id))
        .bearer_auth(&intruder_token)
        .send()
        .await
        .unwrap();
    assert_eq!(publish.status().as_u16(), 403);

    let add_question = client
        .post(format!("{}/api/questions/survey/{}", address, survey_id))
        .bearer_auth(&intruder_token)
        .json(&serde_json::json!({
            "question_text": "Sneaky",
            "question_type": "TEXT"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(add_question.status().as_u16(), 403);

    let update_question = client
        .put(format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&intruder_token)
        .json(&serde_json::json!({
            "question_text": "Sneaky",
            "question_type": "TEXT"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(update_question.status().as_u16(), 403);

    let delete_question = client
        .delete(format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&intruder_token)
        .send()
        .await
        .unwrap();
    assert_eq!(delete_question.status().as_u16(), 403);

    let issue_token = client
        .post(format!("{}/api/survey-tokens/survey/{}", address, survey_id))
        .bearer_auth(&intruder_token)
        .send()
        .await
        .unwrap();
    assert_eq!(issue_token.status().as_u16(), 403);

    // The owner still can do all of it
    let update = client
        .put(format!("{}/api/surveys/{}", address, survey_id))
        .bearer_auth(&owner_token)
        .json(&serde_json::json!({ "title": "Still mine" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 200);
}

#[tokio::test]
async fn survey_text_is_sanitized() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("xss");
    let token = register_and_login(&client, &address, &pool, &username).await;

    let survey: serde_json::Value = client
        .post(format!("{}/api/surveys", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Coffee<script>alert(1)</script> Survey"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(survey["title"], "Coffee Survey");
}
