//! Job lifecycle tracking and progress events.

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use storyreel_models::{Job, JobId, JobKind, JobState, Scene, TransitionError};

use crate::error::{QueueError, QueueResult};
use crate::store::{InMemoryJobStore, JobStore};

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Snapshot published after every job transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: u8,
    pub current_task: String,
    pub at: DateTime<Utc>,
}

impl JobEvent {
    fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            state: job.state,
            progress: job.progress,
            current_task: job.current_task.clone(),
            at: job.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Stream of events for a single job.
pub type JobEventStream = Pin<Box<dyn Stream<Item = JobEvent> + Send>>;

/// Owns job records and fans out their transitions to subscribers.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryJobStore::new()))
    }
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// Register a new pending job.
    pub async fn create(&self, kind: JobKind, total_items: u32) -> QueueResult<Job> {
        let job = Job::new(kind).with_total_items(total_items);
        self.store.insert(job.clone()).await?;
        debug!(job_id = %job.id, kind = %kind, "Job created");
        self.publish(&job);
        Ok(job)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, id: &JobId) -> QueueResult<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| QueueError::job_not_found(id.as_str()))
    }

    pub async fn list(&self) -> QueueResult<Vec<Job>> {
        self.store.list().await
    }

    /// Receive events for every job.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Events for one job. The stream ends after the job's terminal event.
    ///
    /// Subscribe before the job can reach a terminal state, or the terminal
    /// event is missed; [`JobTracker::status`] covers late subscribers.
    pub fn subscribe_job(&self, id: &JobId) -> JobEventStream {
        let rx = self.events.subscribe();
        let id = id.clone();

        let stream = futures_util::stream::unfold(Some(rx), move |rx| {
            let id = id.clone();
            async move {
                let mut rx = rx?;
                loop {
                    match rx.recv().await {
                        Ok(event) if event.job_id == id => {
                            let next = (!event.is_terminal()).then_some(rx);
                            return Some((event, next));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(job_id = %id, skipped, "Job event subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Box::pin(stream)
    }

    /// Write-only handle for the task that owns `id`.
    pub fn handle(&self, id: JobId) -> JobHandle {
        JobHandle {
            id,
            tracker: self.clone(),
        }
    }

    async fn apply<F>(&self, id: &JobId, mutation: F) -> QueueResult<Job>
    where
        F: FnOnce(&mut Job) -> Result<(), TransitionError> + Send + 'static,
    {
        let job = self.store.update(id, Box::new(mutation)).await?;
        self.publish(&job);
        Ok(job)
    }

    fn publish(&self, job: &Job) {
        // No receivers is fine: nobody is watching this job
        let _ = self.events.send(JobEvent::from_job(job));
    }
}

/// Progress sink handed to the pipeline. It can only move its own job
/// forward through the state machine.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    tracker: JobTracker,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub async fn start(&self, task: impl Into<String>) -> QueueResult<()> {
        let task = task.into();
        self.tracker.apply(&self.id, move |job| job.start(task)).await?;
        Ok(())
    }

    /// Report progress (clamped to 100, never decreasing).
    pub async fn progress(&self, percent: u8, task: impl Into<String>) -> QueueResult<()> {
        let task = task.into();
        self.tracker
            .apply(&self.id, move |job| job.record_progress(percent, task))
            .await?;
        Ok(())
    }

    pub async fn set_scenes(&self, scenes: Vec<Scene>) -> QueueResult<()> {
        self.tracker
            .apply(&self.id, move |job| job.set_scenes(scenes))
            .await?;
        Ok(())
    }

    pub async fn complete_video(&self, path: PathBuf) -> QueueResult<()> {
        self.tracker
            .apply(&self.id, move |job| job.complete_video(path))
            .await?;
        Ok(())
    }

    pub async fn complete_images(&self, archive: PathBuf) -> QueueResult<()> {
        self.tracker
            .apply(&self.id, move |job| job.complete_images(archive))
            .await?;
        Ok(())
    }

    pub async fn fail(&self, message: impl Into<String>) -> QueueResult<()> {
        let message = message.into();
        self.tracker.apply(&self.id, move |job| job.fail(message)).await?;
        Ok(())
    }
}
