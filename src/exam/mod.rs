#![allow(dead_code)]

pub mod config;
pub mod engine;
pub mod grading;
pub mod plan;
pub mod planner;
pub mod prompt;
pub mod queue;
pub mod types;

pub use config::ExamConfig;
pub use engine::{AnswerFeedback, AnswerInput, ExamEngine, ExamError, TurnOutput};
#[allow(unused_imports)]
pub use types::*;
