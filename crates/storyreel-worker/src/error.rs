//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Media error: {0}")]
    Media(#[from] storyreel_media::MediaError),

    #[error("AI service error: {0}")]
    Ai(#[from] storyreel_ai::AiError),

    #[error("Queue error: {0}")]
    Queue(#[from] storyreel_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Message shown to users, without the variant prefix for wrapped errors.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::InvalidInput(msg)
            | WorkerError::ProcessingFailed(msg)
            | WorkerError::ConfigError(msg) => msg.clone(),
            WorkerError::Archive(e) => e.to_string(),
            WorkerError::Media(e) => e.to_string(),
            WorkerError::Ai(e) => e.to_string(),
            WorkerError::Queue(e) => e.to_string(),
            WorkerError::Io(e) => e.to_string(),
        }
    }
}
