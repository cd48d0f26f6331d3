// src/services/grading.rs

//! The single authoritative submit path, shared by the HTTP submit handler
//! and the time-limit task.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    config::Config,
    engine::{EngineError, lifecycle::SubmitMode},
    error::AppError,
    models::{answer::AnswerMap, attempt::Attempt, quiz::Quiz, score::ScoreResult},
    repo::{attempts, quizzes},
    state::AppState,
};

/// Grades and stores an attempt, then cancels its pending deadline.
///
/// Saved answers are read, graded and replaced inside one transaction that
/// holds the write lock throughout, so an answer save either lands before
/// the read or is rejected afterwards. Fails with a state error if the
/// attempt was already submitted, including when a concurrent submit
/// commits first.
pub async fn submit(
    state: &AppState,
    attempt_id: &str,
    answers: AnswerMap,
    claimed: SubmitMode,
) -> Result<(Attempt, ScoreResult), AppError> {
    let quiz_id = attempts::get(&state.pool, attempt_id).await?.quiz_id;
    let record = quizzes::get(&state.pool, &quiz_id).await?;
    let quiz = &record.document;

    let mut tx = state.pool.begin().await?;
    if !attempts::lock_open(&mut tx, attempt_id).await? {
        tx.rollback().await?;
        return Err(attempts::already_submitted(attempt_id));
    }

    let mut attempt = attempts::load(&mut tx, attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt '{}' not found", attempt_id)))?;

    let now = Utc::now();
    let mode = effective_mode(&state.config, &attempt, quiz, claimed, now);

    // Dropping `tx` on error rolls it back and releases the lock.
    let result = attempt.submit(quiz, answers, mode, now)?;
    attempts::finalize(&mut tx, &attempt).await?;
    tx.commit().await?;
    state.deadlines.cancel(&attempt.id);

    tracing::info!(
        attempt_id = %attempt.id,
        quiz_id = %attempt.quiz_id,
        score = result.total_score,
        max_score = result.max_score,
        forced = mode == SubmitMode::Forced,
        "Attempt submitted"
    );

    Ok((attempt, result))
}

/// Decides how a submit is treated. Without strict time limits the client's
/// claim is honoured, but early forced claims are logged.
fn effective_mode(
    config: &Config,
    attempt: &Attempt,
    quiz: &Quiz,
    claimed: SubmitMode,
    now: DateTime<Utc>,
) -> SubmitMode {
    if config.strict_time_limit {
        return claimed.resolve(attempt, quiz, now, config.time_limit_grace());
    }

    if claimed == SubmitMode::Forced {
        match attempt.deadline(quiz) {
            Some(deadline) if now < deadline => tracing::warn!(
                attempt_id = %attempt.id,
                seconds_early = (deadline - now).num_seconds(),
                "Forced submission arrived before the time limit"
            ),
            None => tracing::warn!(
                attempt_id = %attempt.id,
                "Forced submission for a quiz without a time limit"
            ),
            Some(_) => {}
        }
    }
    claimed
}

/// Arms the auto-submit task for an attempt on a timed quiz and returns the
/// deadline. The task fires `grace` after the deadline.
pub fn schedule_deadline(state: &AppState, attempt: &Attempt, quiz: &Quiz) -> Option<DateTime<Utc>> {
    let deadline = attempt.deadline(quiz)?;
    let fire_at = deadline + state.config.time_limit_grace();
    let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);

    let task_state = state.clone();
    let attempt_id = attempt.id.clone();
    state.deadlines.schedule(attempt.id.clone(), delay, async move {
        expire(task_state, attempt_id).await;
    });

    Some(deadline)
}

async fn expire(state: AppState, attempt_id: String) {
    match submit(&state, &attempt_id, AnswerMap::new(), SubmitMode::Forced).await {
        Ok((_, result)) => tracing::info!(
            attempt_id = %attempt_id,
            score = result.total_score,
            "Time limit reached, attempt auto-submitted"
        ),
        Err(AppError::Engine(EngineError::State(_))) => {
            tracing::debug!(attempt_id = %attempt_id, "Attempt already submitted before deadline task ran");
        }
        Err(e) => tracing::error!("Failed to auto-submit attempt {}: {:?}", attempt_id, e),
    }
}

/// Re-arms deadline tasks for attempts left open by a previous process.
/// Overdue attempts are submitted right away. Returns how many were armed.
pub async fn resume_deadlines(state: &AppState) -> Result<usize, AppError> {
    let open = attempts::list_open(&state.pool).await?;
    let mut cache: HashMap<String, Option<Quiz>> = HashMap::new();
    let mut armed = 0;

    for attempt in open {
        if !cache.contains_key(&attempt.quiz_id) {
            let quiz = quizzes::find(&state.pool, &attempt.quiz_id)
                .await?
                .map(|record| record.document.0);
            cache.insert(attempt.quiz_id.clone(), quiz);
        }

        if let Some(Some(quiz)) = cache.get(&attempt.quiz_id) {
            if schedule_deadline(state, &attempt, quiz).is_some() {
                armed += 1;
            }
        }
    }

    Ok(armed)
}
