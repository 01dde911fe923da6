pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use registry::JobRegistry;

/// Where an answer has to be delivered: a thread inside a chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub channel_id: String,
    pub thread_id: String,
}

impl Origin {
    pub fn new(channel_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_id: thread_id.into(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.thread_id)
    }
}

/// Delivery state of a job.
///
/// `Failed` is transient: the job stays registered and is retried on the
/// next cycle. Only `Delivered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Failed,
    Delivered,
}

impl JobStatus {
    /// Whether the reconciler should still poll this job.
    pub fn is_outstanding(self) -> bool {
        !matches!(self, JobStatus::Delivered)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Failed => "failed",
            JobStatus::Delivered => "delivered",
        };
        f.write_str(label)
    }
}

/// One prompt/answer exchange with the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub prompt: String,
    pub origin: Origin,
    pub dispatched_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl Job {
    pub fn pending(
        job_id: impl Into<String>,
        prompt: impl Into<String>,
        origin: Origin,
        dispatched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            prompt: prompt.into(),
            origin,
            dispatched_at,
            status: JobStatus::Pending,
        }
    }
}
