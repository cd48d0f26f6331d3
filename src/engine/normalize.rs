// src/engine/normalize.rs

use rand::{Rng, seq::SliceRandom};

use crate::models::quiz::Quiz;

/// Builds a presentation copy of `quiz`, shuffling questions and/or choice
/// options as the quiz settings request.
///
/// Grading compares answers by value, so the copy scores exactly like the
/// original. Never persist the result as the authoritative quiz.
pub fn normalize_quiz(quiz: &Quiz) -> Quiz {
    normalize_quiz_with(quiz, &mut rand::thread_rng())
}

/// Same as [`normalize_quiz`] with a caller-supplied random source.
pub fn normalize_quiz_with<R: Rng + ?Sized>(quiz: &Quiz, rng: &mut R) -> Quiz {
    let mut copy = quiz.clone();

    if copy.shuffle_questions {
        copy.questions.shuffle(rng);
    }

    if copy.shuffle_options {
        for question in &mut copy.questions {
            if let Some(options) = question.kind.options_mut() {
                options.shuffle(rng);
            }
        }
    }

    copy
}
