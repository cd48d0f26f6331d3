// src/repo/attempts.rs

//! Attempt storage.
//!
//! Writes that depend on the attempt still being in progress are guarded in
//! SQL by `submitted_at IS NULL`, so whichever writer commits a submission
//! first wins and every later answer or submit affects zero rows. A submit
//! holds the write lock from before it reads the saved answers until it
//! commits, so an acknowledged answer is always part of the graded set.

use std::collections::{BTreeMap, HashMap};

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    engine::EngineError,
    error::AppError,
    models::{
        answer::AnswerValue,
        attempt::{AnswerRow, Attempt, AttemptRow, RecordedAnswer},
    },
};

const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, started_at, submitted_at, \
    time_taken_seconds, score, max_score, percentage, passed";

pub fn already_submitted(attempt_id: &str) -> AppError {
    AppError::Engine(EngineError::State(format!(
        "Attempt '{}' has already been submitted",
        attempt_id
    )))
}

fn encode_value(value: &AnswerValue) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| AppError::InternalServerError(e.to_string()))
}

fn group_answers(rows: Vec<AnswerRow>) -> HashMap<String, BTreeMap<String, RecordedAnswer>> {
    let mut grouped: HashMap<String, BTreeMap<String, RecordedAnswer>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.attempt_id.clone())
            .or_default()
            .insert(row.question_id.clone(), RecordedAnswer::from(row));
    }
    grouped
}

pub async fn insert(pool: &SqlitePool, attempt: &Attempt) -> Result<(), AppError> {
    sqlx::query("INSERT INTO attempts (id, quiz_id, user_id, started_at) VALUES (?, ?, ?, ?)")
        .bind(&attempt.id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.user_id)
        .bind(attempt.started_at)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert attempt: {:?}", e);
            AppError::from(e)
        })?;

    Ok(())
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Attempt>, AppError> {
    let mut conn = pool.acquire().await?;
    load(&mut conn, id).await
}

/// Loads an attempt and its answers on an existing connection or transaction.
pub async fn load(conn: &mut SqliteConnection, id: &str) -> Result<Option<Attempt>, AppError> {
    let sql = format!("SELECT {} FROM attempts WHERE id = ?", ATTEMPT_COLUMNS);
    let Some(row) = sqlx::query_as::<_, AttemptRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let answers = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT attempt_id, question_id, value, is_correct, earned_points
        FROM attempt_answers
        WHERE attempt_id = ?
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| (row.question_id.clone(), RecordedAnswer::from(row)))
    .collect();

    Ok(Some(row.into_attempt(answers)))
}

/// Like [`find`], but a missing attempt is an error.
pub async fn get(pool: &SqlitePool, id: &str) -> Result<Attempt, AppError> {
    find(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt '{}' not found", id)))
}

/// Upserts one answer, but only while the attempt is still in progress.
pub async fn save_answer(
    pool: &SqlitePool,
    attempt_id: &str,
    question_id: &str,
    value: &AnswerValue,
) -> Result<(), AppError> {
    let encoded = encode_value(value)?;

    let result = sqlx::query(
        r#"
        INSERT INTO attempt_answers (attempt_id, question_id, value)
        SELECT ?, ?, ?
        WHERE EXISTS (SELECT 1 FROM attempts WHERE id = ? AND submitted_at IS NULL)
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(attempt_id)
    .bind(question_id)
    .bind(&encoded)
    .bind(attempt_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(already_submitted(attempt_id));
    }
    Ok(())
}

/// Takes SQLite's write lock for an open attempt inside `tx`.
///
/// Issues a no-op update so the transaction becomes the single writer before
/// anything is read; answer saves from other connections wait until it ends.
/// Returns false if the attempt is missing or already submitted.
pub async fn lock_open(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let locked = sqlx::query(
        "UPDATE attempts SET submitted_at = NULL WHERE id = ? AND submitted_at IS NULL",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(locked.rows_affected() > 0)
}

/// Persists a graded attempt within the caller's transaction.
///
/// The update is still guarded on `submitted_at IS NULL`; if it matches no
/// row, nothing is written and a state error is returned.
pub async fn finalize(conn: &mut SqliteConnection, attempt: &Attempt) -> Result<(), AppError> {
    let claimed = sqlx::query(
        r#"
        UPDATE attempts
        SET submitted_at = ?, time_taken_seconds = ?, score = ?,
            max_score = ?, percentage = ?, passed = ?
        WHERE id = ? AND submitted_at IS NULL
        "#,
    )
    .bind(attempt.submitted_at)
    .bind(attempt.time_taken_seconds.map(i64::from))
    .bind(attempt.score.map(i64::from))
    .bind(attempt.max_score.map(i64::from))
    .bind(attempt.percentage.map(i64::from))
    .bind(attempt.passed)
    .bind(&attempt.id)
    .execute(&mut *conn)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(already_submitted(&attempt.id));
    }

    sqlx::query("DELETE FROM attempt_answers WHERE attempt_id = ?")
        .bind(&attempt.id)
        .execute(&mut *conn)
        .await?;

    for (question_id, recorded) in &attempt.answers {
        sqlx::query(
            r#"
            INSERT INTO attempt_answers (attempt_id, question_id, value, is_correct, earned_points)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(question_id)
        .bind(encode_value(&recorded.value)?)
        .bind(recorded.is_correct)
        .bind(recorded.earned_points.map(i64::from))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Submitted attempts of one quiz, with their graded answers.
pub async fn list_submitted(pool: &SqlitePool, quiz_id: &str) -> Result<Vec<Attempt>, AppError> {
    let sql = format!(
        "SELECT {} FROM attempts WHERE quiz_id = ? AND submitted_at IS NOT NULL ORDER BY submitted_at",
        ATTEMPT_COLUMNS
    );
    let rows = sqlx::query_as::<_, AttemptRow>(&sql)
        .bind(quiz_id)
        .fetch_all(pool)
        .await?;

    let answer_rows = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT aa.attempt_id, aa.question_id, aa.value, aa.is_correct, aa.earned_points
        FROM attempt_answers aa
        JOIN attempts a ON a.id = aa.attempt_id
        WHERE a.quiz_id = ? AND a.submitted_at IS NOT NULL
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut grouped = group_answers(answer_rows);
    Ok(rows
        .into_iter()
        .map(|row| {
            let answers = grouped.remove(&row.id).unwrap_or_default();
            row.into_attempt(answers)
        })
        .collect())
}

/// Attempts still in progress. Answers are not loaded.
pub async fn list_open(pool: &SqlitePool) -> Result<Vec<Attempt>, AppError> {
    let sql = format!(
        "SELECT {} FROM attempts WHERE submitted_at IS NULL",
        ATTEMPT_COLUMNS
    );
    let rows = sqlx::query_as::<_, AttemptRow>(&sql).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| row.into_attempt(BTreeMap::new()))
        .collect())
}
