// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::answer::{AnswerMap, AnswerValue};

/// Lifecycle state of an attempt.
///
/// An attempt that was never started has no record at all, so only the two
/// post-start states are represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

/// One participant's run through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<u32>,
    pub score: Option<u32>,
    pub max_score: Option<u32>,
    pub percentage: Option<u32>,
    pub passed: Option<bool>,
    pub answers: BTreeMap<String, RecordedAnswer>,
}

/// A stored answer. Grading fields stay empty until the attempt is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAnswer {
    pub value: AnswerValue,
    pub is_correct: Option<bool>,
    pub earned_points: Option<u32>,
}

impl RecordedAnswer {
    pub fn ungraded(value: AnswerValue) -> Self {
        RecordedAnswer {
            value,
            is_correct: None,
            earned_points: None,
        }
    }
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    pub score: Option<i64>,
    pub max_score: Option<i64>,
    pub percentage: Option<i64>,
    pub passed: Option<bool>,
}

/// Represents the 'attempt_answers' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerRow {
    pub attempt_id: String,
    pub question_id: String,
    pub value: Json<AnswerValue>,
    pub is_correct: Option<bool>,
    pub earned_points: Option<i64>,
}

impl AttemptRow {
    pub fn into_attempt(self, answers: BTreeMap<String, RecordedAnswer>) -> Attempt {
        let to_u32 = |v: Option<i64>| v.and_then(|n| u32::try_from(n).ok());
        Attempt {
            id: self.id,
            quiz_id: self.quiz_id,
            user_id: self.user_id,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
            time_taken_seconds: to_u32(self.time_taken_seconds),
            score: to_u32(self.score),
            max_score: to_u32(self.max_score),
            percentage: to_u32(self.percentage),
            passed: self.passed,
            answers,
        }
    }
}

impl From<AnswerRow> for RecordedAnswer {
    fn from(row: AnswerRow) -> Self {
        RecordedAnswer {
            value: row.value.0,
            is_correct: row.is_correct,
            earned_points: row.earned_points.and_then(|n| u32::try_from(n).ok()),
        }
    }
}

/// Attempt as returned to clients, with the derived status and deadline.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub status: AttemptStatus,
    pub deadline: Option<DateTime<Utc>>,
}

/// DTO for saving a single answer while the attempt is in progress.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordAnswerRequest {
    #[validate(length(min = 1, max = 200))]
    pub question_id: String,
    #[serde(default)]
    pub value: AnswerValue,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    /// Final answers; merged over any answers saved earlier.
    #[serde(default)]
    #[validate(custom(function = validate_answer_keys))]
    pub answers: AnswerMap,

    /// Set by the client countdown when the time limit ran out.
    #[serde(default)]
    pub forced: bool,
}

fn validate_answer_keys(answers: &AnswerMap) -> Result<(), validator::ValidationError> {
    if answers.keys().any(|k| k.trim().is_empty()) {
        return Err(validator::ValidationError::new("empty_question_id"));
    }
    Ok(())
}

/// Response for a freshly started attempt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub attempt_id: String,
    pub started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
}
