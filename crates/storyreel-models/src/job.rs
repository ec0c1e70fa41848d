//! Job definitions and lifecycle state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::scene::Scene;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state: `pending -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted, not yet picked up by its task
    #[default]
    Pending,
    /// Being processed
    Processing,
    /// Finished with an artifact
    Completed,
    /// Finished without an artifact
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Processing, JobState::Processing)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Generate images from a prompt list and archive them
    Images,
    /// Script text -> narrated video
    TextToVideo,
    /// Voice recording -> transcript -> narrated video
    VoiceToVideo,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Images => "images",
            JobKind::TextToVideo => "text_to_video",
            JobKind::VoiceToVideo => "voice_to_video",
        }
    }

    pub fn produces_video(&self) -> bool {
        !matches!(self, JobKind::Images)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state-machine transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// One end-to-end request tracked from submission to artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Job kind
    pub kind: JobKind,

    /// Scenes planned for the job (empty for image-only jobs)
    #[serde(default)]
    pub scenes: Vec<Scene>,

    /// Lifecycle state
    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Human-readable label of the current step
    #[serde(default)]
    pub current_task: String,

    /// Rendered video (text/voice jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,

    /// Image archive (image jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,

    /// Number of items the job works through (prompts or scenes)
    #[serde(default)]
    pub total_items: u32,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed/failed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            scenes: Vec::new(),
            state: JobState::Pending,
            progress: 0,
            current_task: "Queued".to_string(),
            video_path: None,
            archive_path: None,
            total_items: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_total_items(mut self, total: u32) -> Self {
        self.total_items = total;
        self
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: JobState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Start processing the job.
    pub fn start(&mut self, task: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobState::Processing)?;
        self.started_at = Some(self.updated_at);
        self.current_task = task.into();
        Ok(())
    }

    /// Record progress. Progress is clamped to 100 and never decreases.
    pub fn record_progress(
        &mut self,
        progress: u8,
        task: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.transition(JobState::Processing)?;
        self.progress = self.progress.max(progress.min(100));
        self.current_task = task.into();
        Ok(())
    }

    /// Attach the planned scenes.
    pub fn set_scenes(&mut self, scenes: Vec<Scene>) -> Result<(), TransitionError> {
        self.transition(JobState::Processing)?;
        self.total_items = scenes.len() as u32;
        self.scenes = scenes;
        Ok(())
    }

    /// Mark job as completed with a rendered video.
    pub fn complete_video(&mut self, path: PathBuf) -> Result<(), TransitionError> {
        self.transition(JobState::Completed)?;
        self.video_path = Some(path);
        self.finish("Video generation completed");
        Ok(())
    }

    /// Mark job as completed with an image archive.
    pub fn complete_images(&mut self, path: PathBuf) -> Result<(), TransitionError> {
        self.transition(JobState::Completed)?;
        self.archive_path = Some(path);
        self.finish("Image generation completed");
        Ok(())
    }

    fn finish(&mut self, task: &str) {
        self.progress = 100;
        self.current_task = task.to_string();
        self.finished_at = Some(self.updated_at);
    }

    /// Mark job as failed. The message becomes the current task label.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobState::Failed)?;
        let message = message.into();
        self.current_task = message.clone();
        self.error_message = Some(message);
        self.finished_at = Some(self.updated_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new(JobKind::TextToVideo);

        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.video_path.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = Job::new(JobKind::TextToVideo);

        job.start("Segmenting text").unwrap();
        assert_eq!(job.state, JobState::Processing);
        assert!(job.started_at.is_some());

        job.record_progress(40, "Generating images").unwrap();
        assert_eq!(job.progress, 40);
        assert_eq!(job.current_task, "Generating images");

        job.complete_video(PathBuf::from("/tmp/out.mp4")).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut job = Job::new(JobKind::Images);
        job.start("Generating images").unwrap();

        job.record_progress(60, "step").unwrap();
        job.record_progress(30, "later step").unwrap();
        assert_eq!(job.progress, 60);

        job.record_progress(250, "overflow").unwrap();
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_terminal_states_reject_updates() {
        let mut job = Job::new(JobKind::VoiceToVideo);
        job.start("Transcribing audio").unwrap();
        job.fail("Transcription failed: upstream unavailable").unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.current_task, "Transcription failed: upstream unavailable");

        let err = job.record_progress(10, "late").unwrap_err();
        assert_eq!(err.from, JobState::Failed);
        assert_eq!(err.to, JobState::Processing);
        assert!(job.complete_video(PathBuf::from("x.mp4")).is_err());
    }

    #[test]
    fn test_pending_can_fail_but_not_complete() {
        let mut job = Job::new(JobKind::Images);
        assert!(job.complete_images(PathBuf::from("a.zip")).is_err());
        assert!(job.fail("rejected").is_ok());
    }

    #[test]
    fn test_job_serialization() {
        let job = Job::new(JobKind::VoiceToVideo);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["kind"], "voice_to_video");
        assert_eq!(json["state"], "pending");
        assert!(json.get("video_path").is_none());
    }
}
