//! Periodic retention sweep of terminal jobs.
//!
//! Upstream defines no TTL for finished jobs; the chosen policy is to keep
//! terminal jobs pollable for a configured window and then drop them, which
//! bounds tracker memory without cutting off active pollers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::tracker::JobTracker;

/// Spawn the sweeper task. It runs until the shutdown signal fires.
pub fn spawn_retention_sweeper(
    tracker: Arc<JobTracker>,
    sweep_interval_secs: u64,
    retention_secs: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(sweep_interval_secs.max(1)));
        // Skip the immediate first tick
        interval.tick().await;

        info!(sweep_interval_secs, retention_secs, "Job retention sweeper started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = tracker.sweep_terminal(retention_secs).await;
                    if removed > 0 {
                        info!(removed, "Swept terminal enrichment jobs");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Job retention sweeper stopping");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let tracker = Arc::new(JobTracker::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_retention_sweeper(tracker, 3600, 3600, shutdown_rx);
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_jobs() {
        let tracker = Arc::new(JobTracker::new());
        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        tracker.fail(job_id, "boom".to_string()).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // One-second ticks, zero retention: the first pass removes the job.
        let handle =
            spawn_retention_sweeper(Arc::clone(&tracker), 1, 0, shutdown_rx);

        let mut gone = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if tracker.get(job_id).await.is_none() {
                gone = true;
                break;
            }
        }
        assert!(gone, "terminal job was not swept");

        shutdown_tx.send(true).unwrap();
        let _ = handle.await;
    }
}
