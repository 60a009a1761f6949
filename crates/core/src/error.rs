//! Error types for DocQA.
//!
//! One enum covers every failure category in the workspace. Degraded answers
//! are not errors; they travel as `AnswerOutcome::Degraded` in the knowledge
//! crate and only unexpected failures end up here.

use thiserror::Error;

/// Unified error type for DocQA.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base errors (ingestion, embeddings, retrieval)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// A document could not be opened or parsed.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Vector index storage errors
    #[error("Index error: {0}")]
    Index(String),

    /// Caller supplied something unacceptable (bad upload, duplicate file, ...)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// True for errors caused by the caller's input rather than by DocQA.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Extraction(_) | AppError::Validation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
