//! Job storage.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use storyreel_models::{Job, JobId, TransitionError};

use crate::error::{QueueError, QueueResult};

/// A state change applied to a stored job.
pub type JobMutation = Box<dyn FnOnce(&mut Job) -> Result<(), TransitionError> + Send>;

/// Keyed job storage.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>>;

    /// Insert a new job. Fails if the id is already taken.
    async fn insert(&self, job: Job) -> QueueResult<()>;

    /// Insert or replace a job.
    async fn set(&self, job: Job) -> QueueResult<()>;

    /// Apply `mutation` atomically and return the updated job. The stored
    /// job is left untouched when the mutation fails.
    async fn update(&self, id: &JobId, mutation: JobMutation) -> QueueResult<Job>;

    async fn list(&self) -> QueueResult<Vec<Job>>;
}

/// Process-local store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn insert(&self, job: Job) -> QueueResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn set(&self, job: Job) -> QueueResult<()> {
        self.jobs.write().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update(&self, id: &JobId, mutation: JobMutation) -> QueueResult<Job> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::job_not_found(id.as_str()))?;

        let mut next = stored.clone();
        mutation(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn list(&self) -> QueueResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_models::{JobKind, JobState};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryJobStore::new();
        let job = Job::new(JobKind::TextToVideo);
        let id = job.id.clone();

        store.insert(job.clone()).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().id, id);
        assert!(matches!(
            store.insert(job).await,
            Err(QueueError::AlreadyExists(_))
        ));
        assert!(store.get(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_job_untouched() {
        let store = InMemoryJobStore::new();
        let job = Job::new(JobKind::Images);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let err = store
            .update(&id, Box::new(|job: &mut Job| job.complete_images("a.zip".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition(_)));
        assert_eq!(store.get(&id).await.unwrap().unwrap().state, JobState::Pending);

        let updated = store
            .update(&id, Box::new(|job: &mut Job| job.start("Generating images")))
            .await
            .unwrap();
        assert_eq!(updated.state, JobState::Processing);
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let store = InMemoryJobStore::new();
        let err = store
            .update(&JobId::from_string("missing"), Box::new(|_: &mut Job| Ok(())))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(id) if id == "missing"));
    }
}
