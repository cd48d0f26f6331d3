// src/models/answer.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A participant's answer to one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Text(String),
    Choices(Vec<String>),
    #[default]
    Null,
}

/// Answers keyed by question id. An absent key is the same as [`AnswerValue::Null`].
pub type AnswerMap = HashMap<String, AnswerValue>;

impl AnswerValue {
    /// Unanswered: null, whitespace-only text, or an empty selection.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Null => true,
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Choices(choices) => choices.is_empty(),
            AnswerValue::Bool(_) => false,
        }
    }

    /// String form used by free-text grading.
    pub fn to_text(&self) -> String {
        match self {
            AnswerValue::Null => String::new(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Bool(value) => value.to_string(),
            AnswerValue::Choices(choices) => choices.join(","),
        }
    }
}

/// Looks up a question's answer, treating a missing key as null.
pub fn answer_for<'a>(answers: &'a AnswerMap, question_id: &str) -> &'a AnswerValue {
    const NULL: &AnswerValue = &AnswerValue::Null;
    answers.get(question_id).unwrap_or(NULL)
}
