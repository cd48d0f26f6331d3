// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    engine::lifecycle::SubmitMode,
    error::AppError,
    models::attempt::{
        Attempt, AttemptResponse, RecordAnswerRequest, StartAttemptResponse, SubmitAttemptRequest,
    },
    repo::{attempts, quizzes},
    services::grading,
    state::AppState,
    utils::jwt::Claims,
};

/// Loads an attempt and checks that the caller is the participant who started it.
async fn load_own_attempt(pool: &SqlitePool, id: &str, user_id: &str) -> Result<Attempt, AppError> {
    let attempt = attempts::get(pool, id).await?;
    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "Attempt belongs to another participant".to_string(),
        ));
    }
    Ok(attempt)
}

/// Starts a new attempt.
///
/// * The quiz must be published and not private, unless the caller owns it.
/// * Every call creates a separate attempt; retries never reuse one.
/// * Timed quizzes get a server-side auto-submit task.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let record = quizzes::get(&state.pool, &quiz_id).await?;
    if !record.is_visible_to(user_id) {
        return Err(AppError::NotFound(format!("Quiz '{}' not found", quiz_id)));
    }

    let attempt = Attempt::start(&record.id, user_id, Utc::now());
    attempts::insert(&state.pool, &attempt).await?;
    let deadline = grading::schedule_deadline(&state, &attempt, &record.document);

    tracing::info!(
        attempt_id = %attempt.id,
        quiz_id = %record.id,
        user_id = %user_id,
        "Attempt started"
    );

    Ok((
        StatusCode::CREATED,
        Json(StartAttemptResponse {
            attempt_id: attempt.id,
            started_at: attempt.started_at,
            deadline,
        }),
    ))
}

/// Saves one answer. Repeating a question id overwrites the earlier answer.
pub async fn record_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut attempt = load_own_attempt(&pool, &attempt_id, claims.user_id()).await?;
    let record = quizzes::get(&pool, &attempt.quiz_id).await?;

    attempt.record_answer(&record.document, &req.question_id, req.value.clone())?;
    attempts::save_answer(&pool, &attempt.id, &req.question_id, &req.value).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Submits an attempt and returns its score.
///
/// `forced: true` marks a time-limit submission, which skips the
/// required-answer check.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    load_own_attempt(&state.pool, &attempt_id, claims.user_id()).await?;

    let (_, result) = grading::submit(
        &state,
        &attempt_id,
        req.answers,
        SubmitMode::from_forced(req.forced),
    )
    .await?;

    Ok(Json(result))
}

/// Returns an attempt to its participant or to the quiz owner.
pub async fn get_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::get(&pool, &attempt_id).await?;
    let record = quizzes::get(&pool, &attempt.quiz_id).await?;

    let user_id = claims.user_id();
    if attempt.user_id != user_id && !record.is_owner(user_id) {
        return Err(AppError::Forbidden(
            "Attempt belongs to another participant".to_string(),
        ));
    }

    Ok(Json(AttemptResponse {
        status: attempt.status(),
        deadline: attempt.deadline(&record.document),
        attempt,
    }))
}
