// src/engine/mod.rs

//! Pure quiz assessment core: validation, presentation shuffling, scoring,
//! the attempt state machine and result aggregation.
//!
//! Nothing in here touches storage, time sources or the network; callers
//! pass `now` and already-authorized data in.

pub mod analytics;
pub mod lifecycle;
pub mod normalize;
pub mod scoring;
pub mod validate;

use serde::Serialize;
use std::fmt;

/// A problem found in a quiz document, located by field path
/// (e.g. `questions[2].options`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Issue {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Engine error taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed quiz document. Never accompanied by partial data.
    Validation(Vec<Issue>),

    /// Operation not allowed in the attempt's current state
    /// (answer after submit, second submit, lost submit race).
    State(String),

    /// Voluntary submit with required questions unanswered; holds their ids.
    Precondition(Vec<String>),

    /// Unknown quiz, attempt or question id.
    NotFound(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(issues) => {
                write!(f, "invalid quiz document")?;
                for issue in issues {
                    write!(f, "; {}", issue)?;
                }
                Ok(())
            }
            EngineError::State(msg) => write!(f, "{}", msg),
            EngineError::Precondition(missing) => write!(
                f,
                "required questions are unanswered: {}",
                missing.join(", ")
            ),
            EngineError::NotFound(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EngineError {}
