// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{analytics, attempt, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Document validation and score preview are public.
/// * Everything touching stored quizzes or attempts requires a bearer token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let quiz_routes = Router::<AppState>::new()
        .route("/validate", post(quiz::validate_document))
        .route("/preview", post(quiz::preview_score))
        // Protected quiz routes
        .merge(
            Router::new()
                .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
                .route("/{id}", get(quiz::get_quiz))
                .route("/{id}/publish", put(quiz::publish_quiz))
                .route("/{id}/attempts", post(attempt::start_attempt))
                .route("/{id}/analytics", get(analytics::quiz_analytics))
                .layer(auth.clone()),
        );

    let attempt_routes = Router::<AppState>::new()
        .route("/{id}", get(attempt::get_attempt))
        .route("/{id}/answers", put(attempt::record_answer))
        .route("/{id}/submit", post(attempt::submit_attempt))
        .layer(auth);

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
