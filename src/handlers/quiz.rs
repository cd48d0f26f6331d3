// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    engine::{normalize::normalize_quiz, scoring::score_quiz, validate::validate_quiz},
    error::AppError,
    models::quiz::{
        PreviewRequest, PublicQuiz, PublishQuizRequest, QuizListing, validate_document_size,
    },
    repo::quizzes,
    utils::jwt::Claims,
};

/// Validates a raw quiz document without storing it.
///
/// Always 200: the report itself carries errors and warnings.
pub async fn validate_document(Json(document): Json<Value>) -> Result<impl IntoResponse, AppError> {
    validate_document_size(&document).map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(validate_quiz(&document)))
}

/// Scores answers against a quiz document that has not been stored.
///
/// Uses the same scoring function as attempt submission.
pub async fn preview_score(Json(req): Json<PreviewRequest>) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (quiz, _warnings) = validate_quiz(&req.quiz).into_result()?;

    Ok(Json(score_quiz(&quiz, &req.answers)))
}

/// Creates a quiz from a raw document.
///
/// * Rejects structurally invalid documents with every issue found.
/// * Stores valid ones as unpublished drafts and echoes any warnings.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(document): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    validate_document_size(&document).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (quiz, warnings) = validate_quiz(&document).into_result()?;
    if !warnings.is_empty() {
        tracing::warn!(
            quiz_id = %quiz.id,
            warnings = warnings.len(),
            "Quiz stored with validation warnings"
        );
    }

    let record = quizzes::insert(&pool, claims.user_id(), &quiz).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": record.id,
            "published": record.published,
            "warnings": warnings,
        })),
    ))
}

/// Lists published public quizzes. Unlisted quizzes are reachable by id only.
pub async fn list_quizzes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let listings: Vec<QuizListing> = quizzes::list_public(&pool)
        .await?
        .iter()
        .map(QuizListing::from)
        .collect();

    Ok(Json(listings))
}

/// Returns a quiz for display.
///
/// Owners get the stored document. Everyone else gets a shuffled copy
/// (per the quiz settings) without answers or explanations.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = quizzes::get(&pool, &id).await?;
    let user_id = claims.user_id();

    if !record.is_visible_to(user_id) {
        return Err(AppError::NotFound(format!("Quiz '{}' not found", id)));
    }

    let body = if record.is_owner(user_id) {
        serde_json::to_value(&record.document.0)?
    } else {
        serde_json::to_value(PublicQuiz::from(normalize_quiz(&record.document)))?
    };

    Ok(Json(body))
}

/// Publishes or unpublishes a quiz. Owner only.
pub async fn publish_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<PublishQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = quizzes::get(&pool, &id).await?;
    if !record.is_owner(claims.user_id()) {
        return Err(AppError::Forbidden("Only the quiz owner can publish it".to_string()));
    }

    if !quizzes::set_published(&pool, &id, req.published).await? {
        return Err(AppError::NotFound(format!("Quiz '{}' not found", id)));
    }

    tracing::info!(quiz_id = %id, published = req.published, "Quiz publication changed");

    Ok(Json(json!({ "id": id, "published": req.published })))
}
