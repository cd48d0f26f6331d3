// src/engine/scoring.rs

use crate::models::{
    answer::{AnswerMap, AnswerValue, answer_for},
    quiz::{Question, QuestionKind, Quiz},
    score::{QuestionScore, ScoreResult},
};

/// Grades a full quiz. Missing answers count as incorrect, never as errors.
pub fn score_quiz(quiz: &Quiz, answers: &AnswerMap) -> ScoreResult {
    score_questions(&quiz.questions, answers, quiz.passing_score)
}

/// Grades a question list sourced without its surrounding quiz document.
/// Produces the same result as [`score_quiz`] for the same questions.
///
/// `per_question` follows the order of `questions`.
pub fn score_questions(
    questions: &[Question],
    answers: &AnswerMap,
    passing_score: Option<u8>,
) -> ScoreResult {
    let mut total_score: u32 = 0;
    let mut max_score: u32 = 0;
    let mut per_question = Vec::with_capacity(questions.len());

    for question in questions {
        let answer = answer_for(answers, &question.id);
        let is_correct = is_correct(question, answer);
        let score = if is_correct { question.points } else { 0 };

        total_score = total_score.saturating_add(score);
        max_score = max_score.saturating_add(question.points);
        per_question.push(QuestionScore {
            question_id: question.id.clone(),
            is_correct,
            score,
            max_score: question.points,
            answer: answer.clone(),
        });
    }

    let percentage = percentage(total_score, max_score);
    let passed = passing_score.is_none_or(|threshold| percentage >= u32::from(threshold));

    ScoreResult {
        total_score,
        max_score,
        percentage,
        passed,
        per_question,
    }
}

/// Rounded `part / whole * 100`; zero when `whole` is zero.
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

/// Applies the grading rule of the question's variant.
pub fn is_correct(question: &Question, answer: &AnswerValue) -> bool {
    match &question.kind {
        QuestionKind::MultipleChoiceSingle { correct_answer, .. } => {
            matches!(answer, AnswerValue::Text(text) if text == correct_answer)
        }
        QuestionKind::MultipleChoiceMulti {
            correct_answers, ..
        } => {
            let selected: &[String] = match answer {
                AnswerValue::Choices(choices) => choices,
                _ => &[],
            };
            same_selection(selected, correct_answers)
        }
        QuestionKind::TrueFalse { correct_answer } => {
            matches!(answer, AnswerValue::Bool(value) if value == correct_answer)
        }
        QuestionKind::ShortText { accepted_answers } => {
            let given = normalize_text(&answer.to_text());
            accepted_answers
                .iter()
                .any(|accepted| normalize_text(accepted) == given)
        }
    }
}

/// Order-insensitive comparison: both sides sorted, then compared element-wise.
fn same_selection(selected: &[String], correct: &[String]) -> bool {
    if selected.len() != correct.len() {
        return false;
    }
    let mut selected: Vec<&String> = selected.iter().collect();
    let mut correct: Vec<&String> = correct.iter().collect();
    selected.sort();
    correct.sort();
    selected == correct
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
