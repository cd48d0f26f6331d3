// src/models/score.rs

use serde::Serialize;

use crate::models::answer::AnswerValue;

/// Outcome of grading a full answer set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub total_score: u32,
    /// Sum of points over every question, answered or not.
    pub max_score: u32,
    /// 0-100, rounded half away from zero.
    pub percentage: u32,
    pub passed: bool,
    pub per_question: Vec<QuestionScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionScore {
    pub question_id: String,
    pub is_correct: bool,
    pub score: u32,
    pub max_score: u32,
    pub answer: AnswerValue,
}

/// Aggregate statistics over the submitted attempts of one quiz.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_attempts: usize,
    pub average_score: u32,
    pub median_score: f64,
    /// Percentage of attempts that passed.
    pub pass_rate: u32,
    /// Mean time taken, in seconds.
    pub average_time: u32,
}

/// How one question fared across all graded attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub question_id: String,
    pub answered: usize,
    pub correct: usize,
    pub correct_rate: u32,
}

/// DTO for the analytics endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub quiz_id: String,
    pub summary: Summary,
    pub questions: Vec<QuestionStat>,
}
