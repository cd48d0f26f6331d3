// src/repo/mod.rs

//! sqlx-backed storage for quizzes and attempts.

pub mod attempts;
pub mod quizzes;
