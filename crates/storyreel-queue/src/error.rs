//! Job tracking error types.

use thiserror::Error;

use storyreel_models::TransitionError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Store error: {0}")]
    Store(String),
}

impl QueueError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
