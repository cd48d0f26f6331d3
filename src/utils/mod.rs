// src/utils/mod.rs

pub mod deadline;
pub mod jwt;
