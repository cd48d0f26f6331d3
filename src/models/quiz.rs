// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::answer::AnswerMap;

/// Who may see a published quiz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    /// Reachable by id, never listed.
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Visibility::Private),
            "unlisted" => Some(Visibility::Unlisted),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_points() -> u32 {
    1
}

/// A quiz document as authored.
///
/// Only ever constructed from a document that passed
/// [`validate_quiz`](crate::engine::validate::validate_quiz), so `questions`
/// is non-empty and `id`/`title` are non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
    /// Minimum percentage (0-100) needed to pass. Unset means every attempt passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<u8>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[serde(default = "default_true")]
    pub show_question_list: bool,
    #[serde(default = "default_true")]
    pub allow_skip: bool,
    #[serde(default = "default_true")]
    pub enforce_required_before_submit: bool,
    #[serde(default)]
    pub visibility: Visibility,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Sum of all question points, saturating at `u32::MAX`.
    pub fn max_score(&self) -> u32 {
        self.questions
            .iter()
            .fold(0u32, |total, q| total.saturating_add(q.points))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// The four question variants, tagged by `type` in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum QuestionKind {
    MultipleChoiceSingle {
        options: Vec<String>,
        correct_answer: String,
    },
    MultipleChoiceMulti {
        options: Vec<String>,
        correct_answers: Vec<String>,
    },
    TrueFalse {
        correct_answer: bool,
    },
    ShortText {
        accepted_answers: Vec<String>,
    },
}

impl QuestionKind {
    /// Wire name of the variant, as used in the `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoiceSingle { .. } => "multiple_choice_single",
            QuestionKind::MultipleChoiceMulti { .. } => "multiple_choice_multi",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::ShortText { .. } => "short_text",
        }
    }

    /// Option list for choice questions.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            QuestionKind::MultipleChoiceSingle { options, .. }
            | QuestionKind::MultipleChoiceMulti { options, .. } => Some(options),
            QuestionKind::TrueFalse { .. } | QuestionKind::ShortText { .. } => None,
        }
    }

    pub fn options_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            QuestionKind::MultipleChoiceSingle { options, .. }
            | QuestionKind::MultipleChoiceMulti { options, .. } => Some(options),
            QuestionKind::TrueFalse { .. } | QuestionKind::ShortText { .. } => None,
        }
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuizRecord {
    pub id: String,
    pub owner_id: String,
    pub published: bool,

    /// The validated document, stored as JSON text.
    pub document: Json<Quiz>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl QuizRecord {
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Owners always see their quiz; everyone else needs it published and not private.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.is_owner(user_id)
            || (self.published && self.document.visibility != Visibility::Private)
    }
}

/// Listing entry for public quizzes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizListing {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub question_count: usize,
    pub time_limit_seconds: Option<u32>,
}

impl From<&QuizRecord> for QuizListing {
    fn from(record: &QuizRecord) -> Self {
        let quiz = &record.document;
        QuizListing {
            id: record.id.clone(),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            question_count: quiz.questions.len(),
            time_limit_seconds: quiz.time_limit_seconds,
        }
    }
}

/// DTO for sending a quiz to a participant (excludes answers and explanations).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_seconds: Option<u32>,
    pub passing_score: Option<u8>,
    pub show_question_list: bool,
    pub allow_skip: bool,
    pub enforce_required_before_submit: bool,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    pub prompt: String,
    pub required: bool,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl From<Quiz> for PublicQuiz {
    fn from(quiz: Quiz) -> Self {
        let questions = quiz
            .questions
            .into_iter()
            .map(|q| PublicQuestion {
                question_type: q.kind.type_name(),
                options: q.kind.options().map(<[String]>::to_vec),
                id: q.id,
                prompt: q.prompt,
                required: q.required,
                points: q.points,
            })
            .collect();

        PublicQuiz {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            time_limit_seconds: quiz.time_limit_seconds,
            passing_score: quiz.passing_score,
            show_question_list: quiz.show_question_list,
            allow_skip: quiz.allow_skip,
            enforce_required_before_submit: quiz.enforce_required_before_submit,
            questions,
        }
    }
}

/// DTO for toggling publication.
#[derive(Debug, Deserialize)]
pub struct PublishQuizRequest {
    pub published: bool,
}

/// DTO for scoring a quiz document that has not been stored.
#[derive(Debug, Deserialize, Validate)]
pub struct PreviewRequest {
    #[validate(custom(function = validate_document_size))]
    pub quiz: serde_json::Value,
    #[serde(default)]
    pub answers: AnswerMap,
}

/// Upper bound on a serialized quiz document.
pub const MAX_DOCUMENT_BYTES: usize = 256 * 1024;

/// Limits the size of an incoming quiz document.
pub fn validate_document_size(document: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if document.to_string().len() > MAX_DOCUMENT_BYTES {
        return Err(validator::ValidationError::new("document_too_large"));
    }
    Ok(())
}
