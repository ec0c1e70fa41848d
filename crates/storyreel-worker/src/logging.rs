//! Structured job logging.

use tracing::{error, info, warn, Span};

use storyreel_models::{JobId, JobKind};

/// Logs job lifecycle events with `job_id` and `operation` fields attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, kind: JobKind) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: kind.as_str(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job started: {}", message);
    }

    pub fn log_progress(&self, percent: u8, task: &str) {
        info!(job_id = %self.job_id, operation = self.operation, percent, "Job progress: {}", task);
    }

    /// A recoverable problem: the job continues without the affected item.
    pub fn log_skipped(&self, item: &str, reason: &str) {
        warn!(job_id = %self.job_id, operation = self.operation, item, "Skipped: {}", reason);
    }

    pub fn log_failure(&self, message: &str) {
        error!(job_id = %self.job_id, operation = self.operation, "Job failed: {}", message);
    }

    pub fn log_completion(&self, artifact: &str) {
        info!(job_id = %self.job_id, operation = self.operation, artifact, "Job completed");
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span covering the whole job; nested FFmpeg and HTTP events inherit
    /// its fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = self.operation)
    }
}
