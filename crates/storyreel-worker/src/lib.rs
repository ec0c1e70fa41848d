//! StoryReel job worker.
//!
//! This crate provides:
//! - Job orchestration for image, text-to-video and voice-to-video jobs
//! - Image archive creation
//! - Retry of transient upstream failures
//! - Structured job logging and metrics

pub mod archive;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processor::{JobRequest, JobSubmission, StoryProcessor};
pub use retry::{retry_async, RetryConfig};
