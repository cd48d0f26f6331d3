// src/engine/validate.rs

//! Two-pass quiz document validation.
//!
//! The structural pass walks the raw JSON and collects every problem with its
//! field path. Only a structurally sound document is converted into a typed
//! [`Quiz`]; the semantic pass then reports non-blocking warnings.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    engine::{EngineError, Issue},
    models::quiz::{Question, QuestionKind, Quiz, Visibility},
};

/// Result of validating a raw document. `data` is set iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Quiz>,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    /// Typed quiz plus its warnings, or the structural errors.
    pub fn into_result(self) -> Result<(Quiz, Vec<Issue>), EngineError> {
        match self.data {
            Some(quiz) => Ok((quiz, self.warnings)),
            None => Err(EngineError::Validation(self.errors)),
        }
    }
}

const QUESTION_TYPES: [&str; 4] = [
    "multiple_choice_single",
    "multiple_choice_multi",
    "true_false",
    "short_text",
];

/// Upper bound on the `points` of a single question.
pub const MAX_QUESTION_POINTS: u32 = 1_000_000;

/// Upper bound on the summed points of a quiz, so totals always fit in `u32`.
pub const MAX_TOTAL_POINTS: u32 = 100_000_000;

/// Validates an untyped quiz document.
///
/// Deterministic: identical input always yields identical errors and warnings.
pub fn validate_quiz(document: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    check_quiz(document, &mut errors);

    if !errors.is_empty() {
        return ValidationReport {
            data: None,
            errors,
            warnings: Vec::new(),
        };
    }

    let quiz = match serde_json::from_value::<Quiz>(document.clone()) {
        Ok(quiz) => quiz,
        Err(e) => {
            return ValidationReport {
                data: None,
                errors: vec![Issue::new("$", e.to_string())],
                warnings: Vec::new(),
            };
        }
    };

    if quiz.max_score() > MAX_TOTAL_POINTS {
        return ValidationReport {
            data: None,
            errors: vec![Issue::new(
                "questions",
                format!("total points must not exceed {}", MAX_TOTAL_POINTS),
            )],
            warnings: Vec::new(),
        };
    }

    let warnings = semantic_warnings(&quiz);
    ValidationReport {
        data: Some(quiz),
        errors,
        warnings,
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn check_quiz(document: &Value, errors: &mut Vec<Issue>) {
    let Some(obj) = document.as_object() else {
        errors.push(Issue::new("$", "quiz document must be a JSON object"));
        return;
    };

    required_text(obj, "", "id", errors);
    required_text(obj, "", "title", errors);
    optional_text(obj, "", "description", errors);
    optional_integer(obj, "", "timeLimitSeconds", 1, u32::MAX as u64, errors);
    optional_integer(obj, "", "passingScore", 0, 100, errors);
    for flag in [
        "shuffleQuestions",
        "shuffleOptions",
        "showQuestionList",
        "allowSkip",
        "enforceRequiredBeforeSubmit",
    ] {
        defaulted_bool(obj, "", flag, errors);
    }

    if let Some(visibility) = obj.get("visibility") {
        match visibility.as_str() {
            Some(v) if Visibility::parse(v).is_some() => {}
            _ => errors.push(Issue::new(
                "visibility",
                "must be one of: private, unlisted, public",
            )),
        }
    }

    match obj.get("questions") {
        None => errors.push(Issue::new("questions", "is required")),
        Some(Value::Array(questions)) if questions.is_empty() => {
            errors.push(Issue::new("questions", "must contain at least 1 question"))
        }
        Some(Value::Array(questions)) => {
            for (index, question) in questions.iter().enumerate() {
                check_question(question, &format!("questions[{}]", index), errors);
            }
        }
        Some(_) => errors.push(Issue::new("questions", "must be an array")),
    }
}

fn check_question(question: &Value, path: &str, errors: &mut Vec<Issue>) {
    let Some(obj) = question.as_object() else {
        errors.push(Issue::new(path, "question must be a JSON object"));
        return;
    };

    required_text(obj, path, "id", errors);
    required_text(obj, path, "prompt", errors);
    defaulted_bool(obj, path, "required", errors);
    if obj.contains_key("points") {
        if obj.get("points").is_some_and(Value::is_null) {
            errors.push(Issue::new(join(path, "points"), "must be an integer"));
        } else {
            optional_integer(obj, path, "points", 1, u64::from(MAX_QUESTION_POINTS), errors);
        }
    }
    optional_text(obj, path, "explanation", errors);

    let question_type = match obj.get("type") {
        None => {
            errors.push(Issue::new(join(path, "type"), "is required"));
            return;
        }
        Some(Value::String(t)) if QUESTION_TYPES.contains(&t.as_str()) => t.as_str(),
        Some(_) => {
            errors.push(Issue::new(
                join(path, "type"),
                format!("must be one of: {}", QUESTION_TYPES.join(", ")),
            ));
            return;
        }
    };

    match question_type {
        "multiple_choice_single" => {
            option_list(obj, path, errors);
            match obj.get("correctAnswer") {
                Some(Value::String(_)) => {}
                None => errors.push(Issue::new(join(path, "correctAnswer"), "is required")),
                Some(_) => errors.push(Issue::new(join(path, "correctAnswer"), "must be a string")),
            }
        }
        "multiple_choice_multi" => {
            option_list(obj, path, errors);
            string_list(obj, path, "correctAnswers", 1, "correct answer", errors);
        }
        "true_false" => match obj.get("correctAnswer") {
            Some(Value::Bool(_)) => {}
            None => errors.push(Issue::new(join(path, "correctAnswer"), "is required")),
            Some(_) => errors.push(Issue::new(join(path, "correctAnswer"), "must be a boolean")),
        },
        _ => {
            if let Some(list) = string_list(obj, path, "acceptedAnswers", 1, "accepted answer", errors) {
                for (i, answer) in list.iter().enumerate() {
                    if answer.trim().is_empty() {
                        errors.push(Issue::new(
                            format!("{}[{}]", join(path, "acceptedAnswers"), i),
                            "must not be blank",
                        ));
                    }
                }
            }
        }
    }
}

fn required_text(obj: &Map<String, Value>, parent: &str, key: &str, errors: &mut Vec<Issue>) {
    match obj.get(key) {
        None | Some(Value::Null) => errors.push(Issue::new(join(parent, key), "is required")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(Issue::new(join(parent, key), "must not be empty"))
        }
        Some(Value::String(_)) => {}
        Some(_) => errors.push(Issue::new(join(parent, key), "must be a string")),
    }
}

fn optional_text(obj: &Map<String, Value>, parent: &str, key: &str, errors: &mut Vec<Issue>) {
    match obj.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => errors.push(Issue::new(join(parent, key), "must be a string")),
    }
}

/// Flags that fall back to a default when absent. `null` is not accepted.
fn defaulted_bool(obj: &Map<String, Value>, parent: &str, key: &str, errors: &mut Vec<Issue>) {
    match obj.get(key) {
        None | Some(Value::Bool(_)) => {}
        Some(_) => errors.push(Issue::new(join(parent, key), "must be a boolean")),
    }
}

fn optional_integer(
    obj: &Map<String, Value>,
    parent: &str,
    key: &str,
    min: u64,
    max: u64,
    errors: &mut Vec<Issue>,
) {
    let value = match obj.get(key) {
        None | Some(Value::Null) => return,
        Some(value) => value,
    };
    match value.as_u64() {
        Some(n) if (min..=max).contains(&n) => {}
        Some(_) => errors.push(Issue::new(
            join(parent, key),
            format!("must be between {} and {}", min, max),
        )),
        None => errors.push(Issue::new(join(parent, key), "must be a non-negative integer")),
    }
}

fn option_list(obj: &Map<String, Value>, parent: &str, errors: &mut Vec<Issue>) {
    if let Some(options) = string_list(obj, parent, "options", 2, "option", errors) {
        for (i, option) in options.iter().enumerate() {
            if option.trim().is_empty() {
                errors.push(Issue::new(
                    format!("{}[{}]", join(parent, "options"), i),
                    "option text must not be empty",
                ));
            }
        }
    }
}

/// Checks for an array of strings with at least `min` entries and returns it
/// when every element is a string.
fn string_list<'a>(
    obj: &'a Map<String, Value>,
    parent: &str,
    key: &str,
    min: usize,
    noun: &str,
    errors: &mut Vec<Issue>,
) -> Option<Vec<&'a str>> {
    let path = join(parent, key);
    let items = match obj.get(key) {
        None => {
            errors.push(Issue::new(path, "is required"));
            return None;
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.push(Issue::new(path, "must be an array of strings"));
            return None;
        }
    };

    if items.len() < min {
        let plural = if min == 1 { "" } else { "s" };
        errors.push(Issue::new(
            path.clone(),
            format!("must contain at least {} {}{}", min, noun, plural),
        ));
    }

    let mut strings = Vec::with_capacity(items.len());
    let mut all_strings = true;
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => strings.push(s),
            None => {
                all_strings = false;
                errors.push(Issue::new(format!("{}[{}]", path, i), "must be a string"));
            }
        }
    }

    all_strings.then_some(strings)
}

fn semantic_warnings(quiz: &Quiz) -> Vec<Issue> {
    let mut warnings = Vec::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (index, question) in quiz.questions.iter().enumerate() {
        let path = format!("questions[{}]", index);

        match first_seen.get(question.id.as_str()) {
            Some(first) => warnings.push(Issue::new(
                join(&path, "id"),
                format!(
                    "duplicate question id \"{}\" (first used by questions[{}])",
                    question.id, first
                ),
            )),
            None => {
                first_seen.insert(question.id.as_str(), index);
            }
        }

        question_warnings(question, &path, &mut warnings);
    }

    warnings
}

fn question_warnings(question: &Question, path: &str, warnings: &mut Vec<Issue>) {
    if let Some(options) = question.kind.options() {
        for (i, option) in options.iter().enumerate() {
            if options[..i].contains(option) {
                warnings.push(Issue::new(
                    format!("{}.options[{}]", path, i),
                    format!("duplicate option \"{}\"", option),
                ));
            }
        }
    }

    // Short-text acceptance sets are authoritative, so only choice questions
    // are checked against their options.
    match &question.kind {
        QuestionKind::MultipleChoiceSingle {
            options,
            correct_answer,
        } => {
            if !options.contains(correct_answer) {
                warnings.push(Issue::new(
                    join(path, "correctAnswer"),
                    format!("\"{}\" is not one of the options", correct_answer),
                ));
            }
        }
        QuestionKind::MultipleChoiceMulti {
            options,
            correct_answers,
        } => {
            for (i, answer) in correct_answers.iter().enumerate() {
                let answer_path = format!("{}.correctAnswers[{}]", path, i);
                if !options.contains(answer) {
                    warnings.push(Issue::new(
                        answer_path.clone(),
                        format!("\"{}\" is not one of the options", answer),
                    ));
                }
                if correct_answers[..i].contains(answer) {
                    warnings.push(Issue::new(
                        answer_path,
                        format!("duplicate correct answer \"{}\"", answer),
                    ));
                }
            }
        }
        QuestionKind::TrueFalse { .. } | QuestionKind::ShortText { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "geo",
            "title": "Geography",
            "questions": [
                {
                    "id": "q1",
                    "type": "multiple_choice_single",
                    "prompt": "Capital of France?",
                    "options": ["Paris", "Lyon"],
                    "correctAnswer": "Paris"
                },
                {
                    "id": "q2",
                    "type": "true_false",
                    "prompt": "The Nile is in Africa.",
                    "correctAnswer": true,
                    "required": false,
                    "points": 2
                }
            ]
        })
    }

    fn paths(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_valid_document_applies_defaults() {
        let report = validate_quiz(&sample());
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());

        let quiz = report.data.unwrap();
        assert!(quiz.enforce_required_before_submit);
        assert!(quiz.allow_skip);
        assert!(!quiz.shuffle_questions);
        assert_eq!(quiz.questions[0].points, 1);
        assert!(quiz.questions[0].required);
        assert!(!quiz.questions[1].required);
        assert_eq!(quiz.max_score(), 3);
    }

    #[test]
    fn test_non_object_rejected() {
        let report = validate_quiz(&json!([1, 2]));
        assert!(report.data.is_none());
        assert_eq!(paths(&report.errors), vec!["$"]);
    }

    #[test]
    fn test_missing_fields_collected_with_paths() {
        let report = validate_quiz(&json!({
            "title": "",
            "questions": [{ "id": "q1", "type": "true_false" }]
        }));
        assert!(report.data.is_none());
        assert_eq!(
            paths(&report.errors),
            vec![
                "id",
                "title",
                "questions[0].prompt",
                "questions[0].correctAnswer"
            ]
        );
    }

    #[test]
    fn test_empty_question_list_rejected() {
        let mut doc = sample();
        doc["questions"] = json!([]);
        let report = validate_quiz(&doc);
        assert_eq!(paths(&report.errors), vec!["questions"]);
    }

    #[test]
    fn test_too_few_options_rejected() {
        let mut doc = sample();
        doc["questions"][0]["options"] = json!(["Paris"]);
        let report = validate_quiz(&doc);
        assert!(report.data.is_none());
        assert_eq!(report.errors[0].path, "questions[0].options");
        assert!(report.errors[0].message.contains("at least 2"));
    }

    #[test]
    fn test_empty_answer_sets_rejected() {
        let report = validate_quiz(&json!({
            "id": "x",
            "title": "X",
            "questions": [
                { "id": "a", "type": "multiple_choice_multi", "prompt": "?", "options": ["1", "2"], "correctAnswers": [] },
                { "id": "b", "type": "short_text", "prompt": "?", "acceptedAnswers": [] }
            ]
        }));
        assert_eq!(
            paths(&report.errors),
            vec!["questions[0].correctAnswers", "questions[1].acceptedAnswers"]
        );
    }

    #[test]
    fn test_wrong_types_rejected() {
        let mut doc = sample();
        doc["passingScore"] = json!(140);
        doc["shuffleQuestions"] = json!("yes");
        doc["questions"][1]["points"] = json!(0);
        doc["questions"][1]["type"] = json!("essay");
        let report = validate_quiz(&doc);
        assert_eq!(
            paths(&report.errors),
            vec![
                "passingScore",
                "shuffleQuestions",
                "questions[1].points",
                "questions[1].type"
            ]
        );
    }

    #[test]
    fn test_semantic_warnings_do_not_block() {
        let report = validate_quiz(&json!({
            "id": "x",
            "title": "X",
            "questions": [
                { "id": "q1", "type": "multiple_choice_single", "prompt": "?", "options": ["A", "A", "B"], "correctAnswer": "C" },
                { "id": "q1", "type": "multiple_choice_multi", "prompt": "?", "options": ["A", "B"], "correctAnswers": ["A", "Z", "A"] },
                { "id": "q3", "type": "short_text", "prompt": "?", "acceptedAnswers": ["not an option anywhere"] }
            ]
        }));
        assert!(report.is_valid());
        assert!(report.errors.is_empty());
        assert_eq!(
            paths(&report.warnings),
            vec![
                "questions[0].options[1]",
                "questions[0].correctAnswer",
                "questions[1].id",
                "questions[1].correctAnswers[1]",
                "questions[1].correctAnswers[2]",
            ]
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let mut doc = sample();
        doc["questions"][1]["id"] = json!("q1");
        assert_eq!(validate_quiz(&doc), validate_quiz(&doc));
    }

    #[test]
    fn test_null_optional_fields_accepted() {
        let mut doc = sample();
        doc["description"] = Value::Null;
        doc["timeLimitSeconds"] = Value::Null;
        let report = validate_quiz(&doc);
        assert!(report.is_valid());
        assert_eq!(report.data.unwrap().time_limit_seconds, None);
    }

    #[test]
    fn test_points_are_capped() {
        let mut doc = sample();
        doc["questions"][0]["points"] = json!(u64::from(u32::MAX));
        doc["questions"][1]["points"] = json!(u64::from(u32::MAX));
        let report = validate_quiz(&doc);
        assert!(report.data.is_none());
        assert_eq!(
            paths(&report.errors),
            vec!["questions[0].points", "questions[1].points"]
        );
    }

    #[test]
    fn test_total_points_are_capped() {
        let questions: Vec<_> = (0..101)
            .map(|i| {
                json!({
                    "id": format!("q{}", i),
                    "type": "true_false",
                    "prompt": "?",
                    "correctAnswer": true,
                    "points": MAX_QUESTION_POINTS
                })
            })
            .collect();
        let report = validate_quiz(&json!({ "id": "big", "title": "Big", "questions": questions }));
        assert!(report.data.is_none());
        assert_eq!(paths(&report.errors), vec!["questions"]);

        let within: Vec<_> = (0..100)
            .map(|i| {
                json!({
                    "id": format!("q{}", i),
                    "type": "true_false",
                    "prompt": "?",
                    "correctAnswer": true,
                    "points": MAX_QUESTION_POINTS
                })
            })
            .collect();
        let quiz = validate_quiz(&json!({ "id": "big", "title": "Big", "questions": within }))
            .data
            .unwrap();
        assert_eq!(quiz.max_score(), MAX_TOTAL_POINTS);
    }
}
