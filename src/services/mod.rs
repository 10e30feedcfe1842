pub mod grading;
pub mod leaderboard;
pub mod models;
pub mod progress;
pub mod scheduler;
pub mod selector;

use thiserror::Error;

use crate::services::models::UnknownVariant;

/// `NotFound` message when a level has nothing left to offer a user.
pub const CONTENT_EXHAUSTED: &str = "no content available";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("grading failed: {0}")]
    Grading(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl EngineError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<UnknownVariant> for EngineError {
    fn from(err: UnknownVariant) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
