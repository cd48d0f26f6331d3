// tests/grading_tests.rs

use std::{path::PathBuf, time::Duration};

use chrono::Utc;
use quizkit::{
    SubmitMode,
    config::Config,
    engine::EngineError,
    error::AppError,
    models::{
        answer::{AnswerMap, AnswerValue},
        attempt::{Attempt, AttemptStatus},
        quiz::Quiz,
    },
    repo::{attempts, quizzes},
    services::grading,
    state::AppState,
    utils::deadline::DeadlineScheduler,
    validate_quiz,
};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// A state backed by a throwaway database file, so several pooled
/// connections see the same data and contend for the same write lock.
async fn file_state() -> (AppState, PathBuf) {
    let path = std::env::temp_dir().join(format!("quizkit-{}.db", uuid::Uuid::new_v4()));

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .expect("Failed to open test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: format!("sqlite://{}", path.display()),
        jwt_secret: "unused".to_string(),
        rust_log: "error".to_string(),
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec![],
        strict_time_limit: false,
        time_limit_grace_seconds: 0,
    };

    let state = AppState {
        pool,
        config,
        deadlines: DeadlineScheduler::new(),
    };
    (state, path)
}

async fn cleanup(state: AppState, path: PathBuf) {
    state.pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

async fn stored_quiz(state: &AppState, id: &str, time_limit: Option<u32>) -> Quiz {
    let mut document = json!({
        "id": id,
        "title": "Flags",
        "questions": [
            { "id": "flag", "type": "true_false", "prompt": "Set?", "correctAnswer": true },
            { "id": "word", "type": "short_text", "prompt": "Word?", "required": false,
              "acceptedAnswers": ["rust"] }
        ]
    });
    if let Some(limit) = time_limit {
        document["timeLimitSeconds"] = json!(limit);
    }

    let quiz = validate_quiz(&document).data.expect("fixture quiz is valid");
    quizzes::insert(&state.pool, "author", &quiz).await.unwrap();
    quiz
}

async fn started(state: &AppState, quiz: &Quiz, started_at: chrono::DateTime<Utc>) -> Attempt {
    let attempt = Attempt::start(&quiz.id, "student", started_at);
    attempts::insert(&state.pool, &attempt).await.unwrap();
    attempt
}

#[tokio::test]
async fn saved_answer_is_graded_on_submit() {
    let (state, path) = file_state().await;
    let quiz = stored_quiz(&state, "flags", None).await;
    let attempt = started(&state, &quiz, Utc::now()).await;

    attempts::save_answer(&state.pool, &attempt.id, "flag", &AnswerValue::Bool(true))
        .await
        .unwrap();

    let (submitted, result) =
        grading::submit(&state, &attempt.id, AnswerMap::new(), SubmitMode::Voluntary)
            .await
            .unwrap();

    assert_eq!(result.total_score, 1);
    assert_eq!(submitted.answers["flag"].value, AnswerValue::Bool(true));

    let stored = attempts::get(&state.pool, &attempt.id).await.unwrap();
    assert_eq!(stored.answers["flag"].value, AnswerValue::Bool(true));
    assert_eq!(stored.answers["flag"].is_correct, Some(true));
    assert_eq!(stored.score, Some(1));

    cleanup(state, path).await;
}

#[tokio::test]
async fn answer_save_waits_for_open_submit_and_is_rejected() {
    let (state, path) = file_state().await;
    let quiz = stored_quiz(&state, "flags", None).await;
    let attempt = started(&state, &quiz, Utc::now()).await;

    // Submit side: lock first, then read the saved answers.
    let mut tx = state.pool.begin().await.unwrap();
    assert!(attempts::lock_open(&mut tx, &attempt.id).await.unwrap());
    let mut loaded = attempts::load(&mut tx, &attempt.id).await.unwrap().unwrap();

    let pool = state.pool.clone();
    let attempt_id = attempt.id.clone();
    let saver = tokio::spawn(async move {
        attempts::save_answer(&pool, &attempt_id, "flag", &AnswerValue::Bool(true)).await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!saver.is_finished(), "answer save must wait for the submit");

    loaded
        .submit(&quiz, AnswerMap::new(), SubmitMode::Forced, Utc::now())
        .unwrap();
    attempts::finalize(&mut tx, &loaded).await.unwrap();
    tx.commit().await.unwrap();

    let outcome = saver.await.unwrap();
    assert!(matches!(
        outcome,
        Err(AppError::Engine(EngineError::State(_)))
    ));

    // Nothing was acknowledged, and the stored outcome matches the grading.
    let stored = attempts::get(&state.pool, &attempt.id).await.unwrap();
    assert_eq!(stored.answers["flag"].value, AnswerValue::Null);
    assert_eq!(stored.score, Some(0));

    cleanup(state, path).await;
}

#[tokio::test]
async fn submit_after_submit_is_a_state_error() {
    let (state, path) = file_state().await;
    let quiz = stored_quiz(&state, "flags", None).await;
    let attempt = started(&state, &quiz, Utc::now()).await;

    grading::submit(&state, &attempt.id, AnswerMap::new(), SubmitMode::Forced)
        .await
        .unwrap();
    let err = grading::submit(&state, &attempt.id, AnswerMap::new(), SubmitMode::Forced)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Engine(EngineError::State(_))));

    let missing = grading::submit(&state, "no-such-attempt", AnswerMap::new(), SubmitMode::Forced)
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));

    cleanup(state, path).await;
}

#[tokio::test]
async fn resume_submits_overdue_and_rearms_open_attempts() {
    let (state, path) = file_state().await;
    let timed = stored_quiz(&state, "timed", Some(60)).await;
    let untimed = stored_quiz(&state, "untimed", None).await;

    let overdue = started(&state, &timed, Utc::now() - chrono::Duration::hours(1)).await;
    attempts::save_answer(&state.pool, &overdue.id, "flag", &AnswerValue::Bool(true))
        .await
        .unwrap();
    let running = started(&state, &timed, Utc::now()).await;
    let open_ended = started(&state, &untimed, Utc::now()).await;

    let armed = grading::resume_deadlines(&state).await.unwrap();
    assert_eq!(armed, 2);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let overdue = attempts::get(&state.pool, &overdue.id).await.unwrap();
    assert_eq!(overdue.status(), AttemptStatus::Submitted);
    assert_eq!(overdue.score, Some(1));
    assert!(!state.deadlines.is_pending(&overdue.id));

    let running = attempts::get(&state.pool, &running.id).await.unwrap();
    assert_eq!(running.status(), AttemptStatus::InProgress);
    assert!(state.deadlines.is_pending(&running.id));

    assert!(!state.deadlines.is_pending(&open_ended.id));

    state.deadlines.cancel(&running.id);
    cleanup(state, path).await;
}
