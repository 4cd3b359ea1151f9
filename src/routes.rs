// src/routes.rs

use axum::{
    Router,
    http::Method,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, question, response, survey, token},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, surveys, questions, responses, tokens).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, mailer).
///
/// Authentication is per-handler: handlers taking a `Claims` argument
/// require a Bearer token, everything else is public.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", get(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let survey_routes = Router::new()
        .route("/", get(survey::list_surveys).post(survey::create_survey))
        .route("/my", get(survey::my_surveys))
        .route("/count", get(survey::survey_count))
        .route(
            "/{id}",
            get(survey::get_survey)
                .put(survey::update_survey)
                .delete(survey::delete_survey),
        )
        .route("/{id}/public", get(survey::get_public_survey))
        .route("/{id}/publish", post(survey::publish_survey));

    let question_routes = Router::new()
        .route(
            "/survey/{survey_id}",
            get(question::list_questions).post(question::add_question),
        )
        .route(
            "/{question_id}",
            put(question::update_question).delete(question::delete_question),
        )
        .route("/{question_id}/options", post(question::add_option));

    let response_routes = Router::new()
        .route("/submit", post(response::submit_response))
        .route("/survey/{survey_id}", get(response::list_by_survey))
        .route("/survey/{survey_id}/count", get(response::response_count))
        .route(
            "/question/{question_id}/answers",
            get(response::answers_by_question),
        )
        .route("/{response_id}", get(response::get_response));

    let token_routes = Router::new()
        .route("/survey/{survey_id}", post(token::issue_token))
        .route("/{token}/survey", get(token::get_survey_by_token))
        .route("/{token}/respond", post(token::respond_via_token))
        .route("/{token}", delete(token::revoke_token));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/surveys", survey_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/responses", response_routes)
        .nest("/api/survey-tokens", token_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
