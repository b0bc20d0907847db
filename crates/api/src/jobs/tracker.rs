//! Job tracker: the keyed store polled by status clients.
//!
//! One writer (the worker executing the job) and unlimited concurrent
//! readers per job. Each job has its own lock so unrelated jobs never
//! serialize on each other's progress updates; the outer map lock is held
//! only for entry lookup and insertion.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use domain::models::{JobSnapshot, JobStatus};

#[derive(Debug)]
struct JobEntry {
    status: JobStatus,
    progress: u8,
    updated_at: DateTime<Utc>,
    error: Option<String>,
    result_file_id: Option<i64>,
}

impl JobEntry {
    fn new() -> Self {
        Self {
            status: JobStatus::Queued,
            progress: 0,
            updated_at: Utc::now(),
            error: None,
            result_file_id: None,
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            progress: self.progress,
            updated_at: self.updated_at,
            error: self.error.clone(),
            result_file_id: self.result_file_id,
        }
    }
}

/// Concurrency-safe store of enrichment job state.
///
/// Owned explicitly by the service (created at startup, injected where
/// needed) rather than living in a process-wide singleton.
pub struct JobTracker {
    jobs: RwLock<HashMap<Uuid, Arc<RwLock<JobEntry>>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly accepted job in the `Queued` state.
    pub async fn create(&self, job_id: Uuid) {
        let entry = Arc::new(RwLock::new(JobEntry::new()));
        self.jobs.write().await.insert(job_id, entry);
    }

    /// Drop a job outright (failed submission, retention sweep).
    pub async fn remove(&self, job_id: Uuid) -> bool {
        self.jobs.write().await.remove(&job_id).is_some()
    }

    /// Current snapshot of a job, or `None` if unknown.
    pub async fn get(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let entry = self.entry(job_id).await?;
        let guard = entry.read().await;
        Some(guard.snapshot())
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Mark a job picked up by a worker.
    pub async fn set_processing(&self, job_id: Uuid) {
        self.mutate(job_id, |entry| {
            entry.status = JobStatus::Processing;
        })
        .await;
    }

    /// Publish a progress value.
    ///
    /// Values are clamped to 100 and never move backwards, so pollers
    /// observe a monotonically non-decreasing sequence.
    pub async fn publish_progress(&self, job_id: Uuid, progress: u8) {
        self.mutate(job_id, |entry| {
            entry.progress = entry.progress.max(progress.min(100));
        })
        .await;
    }

    /// Transition to the terminal `Completed` state.
    pub async fn complete(&self, job_id: Uuid, result_file_id: i64) {
        self.mutate(job_id, |entry| {
            entry.status = JobStatus::Completed;
            entry.progress = 100;
            entry.result_file_id = Some(result_file_id);
        })
        .await;
    }

    /// Transition to the terminal `Failed` state.
    ///
    /// Already-published progress is retained for observability.
    pub async fn fail(&self, job_id: Uuid, error: String) {
        self.mutate(job_id, |entry| {
            entry.status = JobStatus::Failed;
            entry.error = Some(error);
        })
        .await;
    }

    /// Remove terminal jobs whose last update is older than `retention_secs`.
    ///
    /// Returns the number of jobs removed.
    pub async fn sweep_terminal(&self, retention_secs: u64) -> usize {
        let retention = Duration::seconds(retention_secs.min(i64::MAX as u64) as i64);
        let now = Utc::now();

        let mut expired = Vec::new();
        {
            let map = self.jobs.read().await;
            for (job_id, entry) in map.iter() {
                let guard = entry.read().await;
                if guard.status.is_terminal() && now - guard.updated_at >= retention {
                    expired.push(*job_id);
                }
            }
        }

        if expired.is_empty() {
            return 0;
        }

        // A terminal job never leaves the terminal state, so the re-check
        // under the write lock is only against concurrent removal.
        let mut map = self.jobs.write().await;
        expired
            .iter()
            .filter(|job_id| map.remove(job_id).is_some())
            .count()
    }

    async fn entry(&self, job_id: Uuid) -> Option<Arc<RwLock<JobEntry>>> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Apply `apply` to a live job entry, refusing updates after a terminal
    /// state so pollers never observe a terminal state followed by a
    /// non-terminal one.
    async fn mutate(&self, job_id: Uuid, apply: impl FnOnce(&mut JobEntry)) {
        let Some(entry) = self.entry(job_id).await else {
            warn!(job_id = %job_id, "Update for unknown job ignored");
            return;
        };

        let mut guard = entry.write().await;
        if guard.status.is_terminal() {
            warn!(job_id = %job_id, status = %guard.status, "Update after terminal state ignored");
            return;
        }
        apply(&mut guard);
        guard.updated_at = Utc::now();
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_starts_queued() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;

        let snapshot = tracker.get(job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let tracker = JobTracker::new();
        assert!(tracker.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        tracker.set_processing(job_id).await;

        tracker.publish_progress(job_id, 50).await;
        tracker.publish_progress(job_id, 30).await;

        let snapshot = tracker.get(job_id).await.unwrap();
        assert_eq!(snapshot.progress, 50);
    }

    #[tokio::test]
    async fn test_progress_clamped_to_100() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;

        tracker.publish_progress(job_id, 250).await;
        assert_eq!(tracker.get(job_id).await.unwrap().progress, 100);
    }

    #[tokio::test]
    async fn test_complete_sets_progress_and_file() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        tracker.set_processing(job_id).await;
        tracker.publish_progress(job_id, 80).await;

        tracker.complete(job_id, 42).await;

        let snapshot = tracker.get(job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.result_file_id, Some(42));
    }

    #[tokio::test]
    async fn test_no_updates_after_terminal_state() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        tracker.fail(job_id, "boom".to_string()).await;

        tracker.set_processing(job_id).await;
        tracker.publish_progress(job_id, 99).await;
        tracker.complete(job_id, 1).await;

        let snapshot = tracker.get(job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
        assert_eq!(snapshot.result_file_id, None);
    }

    #[tokio::test]
    async fn test_failed_job_keeps_flushed_progress() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        tracker.set_processing(job_id).await;
        tracker.publish_progress(job_id, 60).await;

        tracker.fail(job_id, "write error".to_string()).await;

        let snapshot = tracker.get(job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.progress, 60);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_terminal_jobs() {
        let tracker = JobTracker::new();

        let finished = Uuid::new_v4();
        tracker.create(finished).await;
        tracker.complete(finished, 1).await;

        let running = Uuid::new_v4();
        tracker.create(running).await;
        tracker.set_processing(running).await;

        // Zero retention: every terminal job is immediately sweepable.
        let removed = tracker.sweep_terminal(0).await;
        assert_eq!(removed, 1);
        assert!(tracker.get(finished).await.is_none());
        assert!(tracker.get(running).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_respects_retention_window() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        tracker.complete(job_id, 1).await;

        // Just-finished job must stay pollable within the window.
        let removed = tracker.sweep_terminal(3600).await;
        assert_eq!(removed, 0);
        assert!(tracker.get(job_id).await.is_some());
    }

    #[tokio::test]
    async fn test_remove() {
        let tracker = JobTracker::new();
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;

        assert!(tracker.remove(job_id).await);
        assert!(!tracker.remove(job_id).await);
        assert!(tracker.get(job_id).await.is_none());
    }
}
