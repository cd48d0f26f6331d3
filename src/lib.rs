// src/lib.rs

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repo;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

// Re-export specific items for convenience if needed
pub use engine::{
    analytics::summarize, lifecycle::SubmitMode, normalize::normalize_quiz,
    scoring::{score_questions, score_quiz}, validate::validate_quiz,
};
pub use routes::create_router;
