// src/engine/lifecycle.rs

//! Attempt state machine: `start` creates an in-progress attempt, `record_answer`
//! saves answers while it is in progress, and `submit` grades it exactly once.
//!
//! Transitions here are pure; the storage layer is responsible for applying
//! them under per-attempt mutual exclusion.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    engine::{EngineError, scoring::score_quiz},
    models::{
        answer::{AnswerMap, AnswerValue, answer_for},
        attempt::{Attempt, AttemptStatus, RecordedAnswer},
        quiz::Quiz,
        score::ScoreResult,
    },
};

/// Why an attempt is being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// The participant pressed submit; required answers are enforced.
    Voluntary,
    /// The time limit ran out; whatever is answered gets graded.
    Forced,
}

impl SubmitMode {
    pub fn from_forced(forced: bool) -> Self {
        if forced {
            SubmitMode::Forced
        } else {
            SubmitMode::Voluntary
        }
    }

    /// Reconciles the claimed mode with the server clock when time limits
    /// are enforced strictly: a forced claim before the deadline becomes
    /// voluntary, a voluntary submit past `deadline + grace` becomes forced.
    /// Quizzes without a time limit always submit voluntarily.
    pub fn resolve(self, attempt: &Attempt, quiz: &Quiz, now: DateTime<Utc>, grace: Duration) -> Self {
        let Some(deadline) = attempt.deadline(quiz) else {
            return SubmitMode::Voluntary;
        };
        match self {
            SubmitMode::Forced if now < deadline => SubmitMode::Voluntary,
            SubmitMode::Voluntary if now > deadline + grace => SubmitMode::Forced,
            mode => mode,
        }
    }
}

impl Attempt {
    /// Creates a fresh in-progress attempt with no answers.
    ///
    /// The caller must already have checked that `user_id` may take the quiz.
    pub fn start(quiz_id: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Attempt {
            id: Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            user_id: user_id.to_string(),
            started_at: now,
            submitted_at: None,
            time_taken_seconds: None,
            score: None,
            max_score: None,
            percentage: None,
            passed: None,
            answers: BTreeMap::new(),
        }
    }

    pub fn status(&self) -> AttemptStatus {
        if self.submitted_at.is_some() {
            AttemptStatus::Submitted
        } else {
            AttemptStatus::InProgress
        }
    }

    /// When the time limit runs out, if the quiz has one.
    pub fn deadline(&self, quiz: &Quiz) -> Option<DateTime<Utc>> {
        quiz.time_limit_seconds
            .map(|limit| self.started_at + Duration::seconds(i64::from(limit)))
    }

    /// Saves one answer, replacing any earlier answer to the same question.
    pub fn record_answer(
        &mut self,
        quiz: &Quiz,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<(), EngineError> {
        self.ensure_in_progress()?;
        if quiz.question(question_id).is_none() {
            return Err(EngineError::NotFound(format!(
                "Question '{}' not found in quiz '{}'",
                question_id, quiz.id
            )));
        }
        self.answers
            .insert(question_id.to_string(), RecordedAnswer::ungraded(value));
        Ok(())
    }

    /// Answers saved so far, as a plain answer map.
    pub fn answer_map(&self) -> AnswerMap {
        self.answers
            .iter()
            .map(|(id, recorded)| (id.clone(), recorded.value.clone()))
            .collect()
    }

    /// Grades the attempt and moves it to `Submitted`.
    ///
    /// `answers` overlay the saved ones. On a voluntary submit with required
    /// questions unanswered, nothing changes and `Precondition` is returned.
    ///
    /// Outcomes are stored per question id. A quiz that reuses an id (the
    /// validator only warns about it) grades each question on its own, but
    /// only the last outcome for that id is kept in `answers`.
    pub fn submit(
        &mut self,
        quiz: &Quiz,
        answers: AnswerMap,
        mode: SubmitMode,
        now: DateTime<Utc>,
    ) -> Result<ScoreResult, EngineError> {
        self.ensure_in_progress()?;

        if let Some(unknown) = answers.keys().find(|id| quiz.question(id).is_none()) {
            return Err(EngineError::NotFound(format!(
                "Question '{}' not found in quiz '{}'",
                unknown, quiz.id
            )));
        }

        let mut merged = self.answer_map();
        merged.extend(answers);

        if mode == SubmitMode::Voluntary && quiz.enforce_required_before_submit {
            let missing = missing_required(quiz, &merged);
            if !missing.is_empty() {
                return Err(EngineError::Precondition(missing));
            }
        }

        let result = score_quiz(quiz, &merged);

        self.answers = result
            .per_question
            .iter()
            .map(|outcome| {
                (
                    outcome.question_id.clone(),
                    RecordedAnswer {
                        value: outcome.answer.clone(),
                        is_correct: Some(outcome.is_correct),
                        earned_points: Some(outcome.score),
                    },
                )
            })
            .collect();
        self.time_taken_seconds = Some(elapsed_seconds(self.started_at, now));
        self.score = Some(result.total_score);
        self.max_score = Some(result.max_score);
        self.percentage = Some(result.percentage);
        self.passed = Some(result.passed);
        self.submitted_at = Some(now);

        Ok(result)
    }

    fn ensure_in_progress(&self) -> Result<(), EngineError> {
        match self.status() {
            AttemptStatus::InProgress => Ok(()),
            AttemptStatus::Submitted => Err(EngineError::State(format!(
                "Attempt '{}' has already been submitted",
                self.id
            ))),
        }
    }
}

/// Ids of required questions without a non-blank answer, in quiz order.
pub fn missing_required(quiz: &Quiz, answers: &AnswerMap) -> Vec<String> {
    quiz.questions
        .iter()
        .filter(|q| q.required && answer_for(answers, &q.id).is_blank())
        .map(|q| q.id.clone())
        .collect()
}

/// Whether the participant may move past the question at `index`.
///
/// Required questions must be answered; optional ones may be skipped only
/// when the quiz allows skipping.
pub fn can_advance(quiz: &Quiz, index: usize, answers: &AnswerMap) -> bool {
    let Some(question) = quiz.questions.get(index) else {
        return false;
    };
    let answered = !answer_for(answers, &question.id).is_blank();
    if question.required {
        answered
    } else {
        quiz.allow_skip || answered
    }
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let millis = (to - from).num_milliseconds().max(0);
    (millis as f64 / 1000.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{Question, QuestionKind, Visibility};

    fn quiz() -> Quiz {
        Quiz {
            id: "quiz".into(),
            title: "Quiz".into(),
            description: None,
            time_limit_seconds: Some(60),
            passing_score: Some(50),
            shuffle_questions: false,
            shuffle_options: false,
            show_question_list: true,
            allow_skip: false,
            enforce_required_before_submit: true,
            visibility: Visibility::Public,
            questions: vec![
                Question {
                    id: "req".into(),
                    prompt: "Required".into(),
                    required: true,
                    points: 1,
                    explanation: None,
                    kind: QuestionKind::TrueFalse { correct_answer: true },
                },
                Question {
                    id: "opt".into(),
                    prompt: "Optional".into(),
                    required: false,
                    points: 1,
                    explanation: None,
                    kind: QuestionKind::ShortText {
                        accepted_answers: vec!["rust".into()],
                    },
                },
            ],
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_start_is_in_progress() {
        let attempt = Attempt::start("quiz", "alice", at(0));
        assert_eq!(attempt.status(), AttemptStatus::InProgress);
        assert!(attempt.answers.is_empty());
        assert_eq!(attempt.deadline(&quiz()), Some(at(60)));
    }

    #[test]
    fn test_each_start_gets_its_own_id() {
        let a = Attempt::start("quiz", "alice", at(0));
        let b = Attempt::start("quiz", "alice", at(0));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_answer_last_write_wins() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        attempt.record_answer(&quiz, "opt", AnswerValue::Text("go".into())).unwrap();
        attempt.record_answer(&quiz, "opt", AnswerValue::Text("rust".into())).unwrap();
        assert_eq!(attempt.answers.len(), 1);
        assert_eq!(attempt.answers["opt"].value, AnswerValue::Text("rust".into()));
        assert_eq!(attempt.status(), AttemptStatus::InProgress);
    }

    #[test]
    fn test_record_answer_unknown_question() {
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        let err = attempt
            .record_answer(&quiz(), "nope", AnswerValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_voluntary_submit_requires_answers() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        let err = attempt
            .submit(&quiz, AnswerMap::new(), SubmitMode::Voluntary, at(10))
            .unwrap_err();
        assert_eq!(err, EngineError::Precondition(vec!["req".to_string()]));
        assert_eq!(attempt.status(), AttemptStatus::InProgress);
        assert_eq!(attempt.score, None);
    }

    #[test]
    fn test_required_check_can_be_disabled() {
        let mut quiz = quiz();
        quiz.enforce_required_before_submit = false;
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        let result = attempt
            .submit(&quiz, AnswerMap::new(), SubmitMode::Voluntary, at(10))
            .unwrap();
        assert_eq!(result.total_score, 0);
    }

    #[test]
    fn test_forced_submit_grades_missing_as_wrong() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        attempt.record_answer(&quiz, "opt", AnswerValue::Text(" Rust ".into())).unwrap();

        let result = attempt
            .submit(&quiz, AnswerMap::new(), SubmitMode::Forced, at(61))
            .unwrap();
        assert_eq!(result.total_score, 1);
        assert!(!result.per_question[0].is_correct);
        assert_eq!(attempt.status(), AttemptStatus::Submitted);
        assert_eq!(attempt.time_taken_seconds, Some(61));
        assert_eq!(attempt.answers["req"].value, AnswerValue::Null);
        assert_eq!(attempt.answers["req"].is_correct, Some(false));
        assert_eq!(attempt.answers["opt"].earned_points, Some(1));
        assert_eq!(attempt.passed, Some(true));
    }

    #[test]
    fn test_submit_overlays_saved_answers() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        attempt.record_answer(&quiz, "req", AnswerValue::Bool(false)).unwrap();

        let answers = AnswerMap::from([("req".to_string(), AnswerValue::Bool(true))]);
        let result = attempt
            .submit(&quiz, answers, SubmitMode::Voluntary, at(5))
            .unwrap();
        assert!(result.per_question[0].is_correct);
    }

    #[test]
    fn test_second_submit_is_rejected() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        let answers = AnswerMap::from([("req".to_string(), AnswerValue::Bool(true))]);
        attempt
            .submit(&quiz, answers.clone(), SubmitMode::Voluntary, at(5))
            .unwrap();
        let snapshot = attempt.clone();

        let err = attempt
            .submit(&quiz, AnswerMap::new(), SubmitMode::Forced, at(9))
            .unwrap_err();
        assert!(matches!(err, EngineError::State(_)));
        assert_eq!(attempt, snapshot);

        let err = attempt
            .record_answer(&quiz, "opt", AnswerValue::Text("late".into()))
            .unwrap_err();
        assert!(matches!(err, EngineError::State(_)));
        assert_eq!(attempt, snapshot);
    }

    #[test]
    fn test_submit_rejects_unknown_question_ids() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        let answers = AnswerMap::from([("ghost".to_string(), AnswerValue::Bool(true))]);
        let err = attempt
            .submit(&quiz, answers, SubmitMode::Forced, at(5))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(attempt.status(), AttemptStatus::InProgress);
    }

    #[test]
    fn test_time_taken_rounds() {
        let quiz = quiz();
        let mut attempt = Attempt::start("quiz", "alice", at(0));
        let now = at(12) + Duration::milliseconds(600);
        attempt
            .submit(&quiz, AnswerMap::new(), SubmitMode::Forced, now)
            .unwrap();
        assert_eq!(attempt.time_taken_seconds, Some(13));
    }

    #[test]
    fn test_resolve_mode_against_deadline() {
        let quiz = quiz();
        let attempt = Attempt::start("quiz", "alice", at(0));
        let grace = Duration::seconds(5);

        assert_eq!(SubmitMode::Forced.resolve(&attempt, &quiz, at(30), grace), SubmitMode::Voluntary);
        assert_eq!(SubmitMode::Forced.resolve(&attempt, &quiz, at(60), grace), SubmitMode::Forced);
        assert_eq!(SubmitMode::Voluntary.resolve(&attempt, &quiz, at(64), grace), SubmitMode::Voluntary);
        assert_eq!(SubmitMode::Voluntary.resolve(&attempt, &quiz, at(66), grace), SubmitMode::Forced);

        let mut untimed = quiz.clone();
        untimed.time_limit_seconds = None;
        assert_eq!(SubmitMode::Forced.resolve(&attempt, &untimed, at(999), grace), SubmitMode::Voluntary);
    }

    #[test]
    fn test_navigation_gating() {
        let mut quiz = quiz();
        let mut answers = AnswerMap::new();

        assert!(!can_advance(&quiz, 0, &answers));
        assert!(!can_advance(&quiz, 1, &answers));

        quiz.allow_skip = true;
        assert!(!can_advance(&quiz, 0, &answers));
        assert!(can_advance(&quiz, 1, &answers));

        answers.insert("req".into(), AnswerValue::Bool(false));
        assert!(can_advance(&quiz, 0, &answers));
        assert!(!can_advance(&quiz, 5, &answers));
    }

    #[test]
    fn test_blank_text_counts_as_missing() {
        let quiz = quiz();
        let answers = AnswerMap::from([
            ("req".to_string(), AnswerValue::Text("   ".into())),
        ]);
        assert_eq!(missing_required(&quiz, &answers), vec!["req".to_string()]);
    }

    #[test]
    fn test_duplicate_ids_keep_last_outcome() {
        let mut quiz = quiz();
        quiz.questions[1].id = "req".into();
        let mut attempt = Attempt::start("quiz", "alice", at(0));

        let answers = AnswerMap::from([("req".to_string(), AnswerValue::Bool(true))]);
        let result = attempt
            .submit(&quiz, answers, SubmitMode::Forced, at(5))
            .unwrap();

        assert_eq!(result.per_question.len(), 2);
        assert!(result.per_question[0].is_correct);
        assert!(!result.per_question[1].is_correct);
        assert_eq!(attempt.answers.len(), 1);
        assert_eq!(attempt.answers["req"].is_correct, Some(false));
    }
}
