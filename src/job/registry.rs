use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Job, JobStatus};

/// Outstanding jobs keyed by job id.
///
/// The dispatcher only registers; the reconciler marks and evicts. Readers
/// take a [`snapshot`](JobRegistry::snapshot) so a cycle never iterates
/// while a dispatch is appending.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Add a job. A follow-up dispatch on an already registered job id
    /// replaces the entry, so each job id is tracked once.
    pub async fn register(&self, job: Job) {
        self.jobs.write().await.insert(job.job_id.clone(), job);
    }

    /// Copy of every outstanding job, taken under a single read lock.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status.is_outstanding())
            .cloned()
            .collect()
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Update a job's status. Returns false if the job is not registered.
    pub async fn mark(&self, job_id: &str, status: JobStatus) -> bool {
        match self.jobs.write().await.get_mut(job_id) {
            Some(job) => {
                job.status = status;
                true
            }
            None => false,
        }
    }

    /// Remove a job, returning it if it was registered.
    pub async fn evict(&self, job_id: &str) -> Option<Job> {
        self.jobs.write().await.remove(job_id)
    }

    /// Mark a job `Delivered` and remove it, but only if it is still the
    /// registration `job` was copied from. A follow-up dispatched since the
    /// snapshot stays registered and `None` is returned.
    pub async fn complete(&self, job: &Job) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        let unchanged = jobs.get(&job.job_id).is_some_and(|current| {
            current.prompt == job.prompt
                && current.origin == job.origin
                && current.dispatched_at == job.dispatched_at
        });
        if !unchanged {
            return None;
        }
        let mut done = jobs.remove(&job.job_id)?;
        done.status = JobStatus::Delivered;
        Some(done)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
