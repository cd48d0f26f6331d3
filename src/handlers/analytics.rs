// src/handlers/analytics.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    engine::analytics::{question_stats, summarize},
    error::AppError,
    models::score::AnalyticsResponse,
    repo::{attempts, quizzes},
    utils::jwt::Claims,
};

/// Aggregate results over all submitted attempts of a quiz. Owner only.
pub async fn quiz_analytics(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = quizzes::get(&pool, &quiz_id).await?;
    if !record.is_owner(claims.user_id()) {
        return Err(AppError::Forbidden(
            "Only the quiz owner can view analytics".to_string(),
        ));
    }

    let submitted = attempts::list_submitted(&pool, &quiz_id).await?;

    Ok(Json(AnalyticsResponse {
        summary: summarize(&submitted),
        questions: question_stats(&record.document, &submitted),
        quiz_id,
    }))
}
