//! Append-only record of delivered jobs, kept for offline latency analysis.
//!
//! Records are grouped by parent job: the first delivery for a job opens a
//! group, follow-ups in the same thread append to it. Nothing in the engine
//! reads the archive back; it is exported as a JSON snapshot on demand.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::job::Job;

/// One delivered answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub id: Uuid,
    pub job_id: String,
    pub parent_job_id: String,
    pub prompt: String,
    pub answer: String,
    pub dispatched_at: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
    pub latency_ms: i64,
}

impl AnalyticsRecord {
    /// Record a delivered job. Threads keep one job for their lifetime, so
    /// the job is its own parent.
    pub fn delivered(job: &Job, answer: impl Into<String>, delivered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.job_id.clone(),
            parent_job_id: job.job_id.clone(),
            prompt: job.prompt.clone(),
            answer: answer.into(),
            dispatched_at: job.dispatched_at,
            delivered_at,
            latency_ms: (delivered_at - job.dispatched_at).num_milliseconds(),
        }
    }
}

/// The first record for a parent job and everything after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveGroup {
    pub parent: AnalyticsRecord,
    pub following: Vec<AnalyticsRecord>,
}

#[derive(Default)]
pub struct AnalyticsArchive {
    groups: Mutex<Vec<ArchiveGroup>>,
}

impl AnalyticsArchive {
    pub fn new() -> Self {
        Self::default()
    }

    fn groups(&self) -> MutexGuard<'_, Vec<ArchiveGroup>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, record: AnalyticsRecord) {
        let mut groups = self.groups();
        match groups
            .iter_mut()
            .find(|group| group.parent.job_id == record.parent_job_id)
        {
            Some(group) => group.following.push(record),
            None => groups.push(ArchiveGroup {
                parent: record,
                following: Vec::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<ArchiveGroup> {
        self.groups().clone()
    }

    /// Total number of records across all groups.
    pub fn len(&self) -> usize {
        self.groups()
            .iter()
            .map(|group| 1 + group.following.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }

    /// Write the current groups to `path` as pretty-printed JSON.
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write archive to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Origin;
    use chrono::Duration;

    fn record(job_id: &str, prompt: &str) -> AnalyticsRecord {
        let dispatched = Utc::now();
        let job = Job::pending(job_id, prompt, Origin::new("C1", "T1"), dispatched);
        AnalyticsRecord::delivered(&job, "answer", dispatched + Duration::milliseconds(1500))
    }

    #[test]
    fn record_computes_latency() {
        let r = record("J1", "ping");
        assert_eq!(r.latency_ms, 1500);
        assert_eq!(r.parent_job_id, "J1");
    }

    #[test]
    fn first_record_opens_group() {
        let archive = AnalyticsArchive::new();
        archive.append(record("J1", "ping"));

        let groups = archive.snapshot();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].parent.prompt, "ping");
        assert!(groups[0].following.is_empty());
    }

    #[test]
    fn follow_ups_join_parent_group() {
        let archive = AnalyticsArchive::new();
        archive.append(record("J1", "first"));
        archive.append(record("J2", "other"));
        archive.append(record("J1", "second"));

        let groups = archive.snapshot();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].following.len(), 1);
        assert_eq!(groups[0].following[0].prompt, "second");
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn records_get_distinct_ids() {
        assert_ne!(record("J1", "a").id, record("J1", "a").id);
    }

    #[test]
    fn snapshot_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("archive.json");

        let archive = AnalyticsArchive::new();
        archive.append(record("J1", "ping"));
        archive.write_snapshot(&path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let groups: Vec<ArchiveGroup> = serde_json::from_str(&json).unwrap();
        assert_eq!(groups, archive.snapshot());
    }

    #[test]
    fn empty_archive() {
        let archive = AnalyticsArchive::new();
        assert!(archive.is_empty());
        assert_eq!(archive.len(), 0);
    }
}
