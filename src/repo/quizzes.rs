// src/repo/quizzes.rs

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};

use crate::{
    error::AppError,
    models::quiz::{Quiz, QuizRecord},
};

/// Stores a validated quiz as an unpublished draft owned by `owner_id`.
pub async fn insert(pool: &SqlitePool, owner_id: &str, quiz: &Quiz) -> Result<QuizRecord, AppError> {
    let document =
        serde_json::to_string(quiz).map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let created_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO quizzes (id, owner_id, title, visibility, published, document, created_at)
        VALUES (?, ?, ?, ?, FALSE, ?, ?)
        "#,
    )
    .bind(&quiz.id)
    .bind(owner_id)
    .bind(&quiz.title)
    .bind(quiz.visibility.as_str())
    .bind(&document)
    .bind(created_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            AppError::Conflict(format!("Quiz '{}' already exists", quiz.id))
        } else {
            tracing::error!("Failed to insert quiz: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok(QuizRecord {
        id: quiz.id.clone(),
        owner_id: owner_id.to_string(),
        published: false,
        document: Json(quiz.clone()),
        created_at,
    })
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<QuizRecord>, AppError> {
    let record = sqlx::query_as::<_, QuizRecord>(
        "SELECT id, owner_id, published, document, created_at FROM quizzes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch quiz {}: {:?}", id, e);
        AppError::from(e)
    })?;

    Ok(record)
}

/// Like [`find`], but a missing quiz is an error.
pub async fn get(pool: &SqlitePool, id: &str) -> Result<QuizRecord, AppError> {
    find(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz '{}' not found", id)))
}

/// Returns false when no quiz has this id.
pub async fn set_published(pool: &SqlitePool, id: &str, published: bool) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE quizzes SET published = ? WHERE id = ?")
        .bind(published)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Published quizzes with public visibility, newest first.
pub async fn list_public(pool: &SqlitePool) -> Result<Vec<QuizRecord>, AppError> {
    let records = sqlx::query_as::<_, QuizRecord>(
        r#"
        SELECT id, owner_id, published, document, created_at
        FROM quizzes
        WHERE published = TRUE AND visibility = 'public'
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list quizzes: {:?}", e);
        AppError::from(e)
    })?;

    Ok(records)
}
