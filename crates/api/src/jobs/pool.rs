//! Bounded worker pool consuming the enrichment job queue.
//!
//! Each queue entry is one job; workers pull entries independently, so jobs
//! run in parallel while a single job is only ever executed once. Submitting
//! never blocks: a full queue is reported back to the caller synchronously.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::enrichment::{EnrichmentEngine, EnrichmentTask};

/// Errors surfaced to the submitting request.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("enrichment queue is full, try again later")]
    QueueFull,

    #[error("worker pool is shut down")]
    Closed,
}

/// Cloneable handle for submitting jobs and inspecting queue pressure.
#[derive(Clone)]
pub struct JobSubmitter {
    tx: mpsc::Sender<EnrichmentTask>,
    worker_count: usize,
    queue_capacity: usize,
}

impl JobSubmitter {
    /// Enqueue a job without blocking.
    pub fn submit(&self, task: EnrichmentTask) -> Result<(), SubmitError> {
        self.tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Jobs currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue_capacity.saturating_sub(self.tx.capacity())
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

/// The running pool of enrichment workers.
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
    submitter: JobSubmitter,
}

impl WorkerPool {
    /// Spawn `worker_count` workers over a queue of `queue_capacity` entries.
    pub fn start(
        engine: Arc<EnrichmentEngine>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<EnrichmentTask>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(worker_count, queue_capacity, "Starting enrichment worker pool");

        let mut handles = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let engine = Arc::clone(&engine);
            let rx = Arc::clone(&rx);
            let mut shutdown_rx = shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    // Only one idle worker waits on the queue at a time; the
                    // lock is released as soon as a task is handed over.
                    let task = {
                        let mut queue = rx.lock().await;
                        tokio::select! {
                            task = queue.recv() => task,
                            _ = shutdown_rx.changed() => None,
                        }
                    };

                    let Some(task) = task else {
                        info!(worker, "Enrichment worker stopping");
                        break;
                    };

                    let job_id = task.job_id;
                    let start = std::time::Instant::now();
                    info!(worker, job_id = %job_id, "Job picked up");

                    engine.execute(task).await;

                    info!(
                        worker,
                        job_id = %job_id,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Job finished"
                    );
                }
            }));
        }

        Self {
            shutdown_tx,
            shutdown_rx,
            handles,
            submitter: JobSubmitter {
                tx,
                worker_count,
                queue_capacity: queue_capacity.max(1),
            },
        }
    }

    /// Handle for submitting jobs; safe to clone into request state.
    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    /// Shutdown receiver for sibling background tasks.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Signal all workers to stop once their current job finishes.
    pub fn shutdown(&self) {
        info!("Initiating worker pool shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all workers to finish, up to `timeout`.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let join_all = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Worker task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => info!("All workers stopped"),
            Err(_) => warn!("Worker shutdown timed out after {:?}", timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::tracker::JobTracker;
    use crate::services::external_api::ExternalFetcher;
    use domain::models::EnrichmentRequest;
    use uuid::Uuid;

    fn test_engine(tracker: Arc<JobTracker>) -> Arc<EnrichmentEngine> {
        // A lazy pool never connects until a query runs; the short acquire
        // timeout keeps failing jobs fast in tests.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy("postgres://test@127.0.0.1:1/test")
            .expect("lazy pool");
        let fetcher = ExternalFetcher::new(Duration::from_secs(1)).expect("fetcher");
        Arc::new(EnrichmentEngine::new(
            pool,
            tracker,
            fetcher,
            std::env::temp_dir(),
            100,
        ))
    }

    fn test_task(job_id: Uuid) -> EnrichmentTask {
        EnrichmentTask {
            job_id,
            file_id: 1,
            request: EnrichmentRequest {
                api_endpoint: "http://127.0.0.1:1/records".to_string(),
                file_key: "id".to_string(),
                api_key: "id".to_string(),
                enriched_file_name: "out.csv".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_submit_and_queue_accounting() {
        let tracker = Arc::new(JobTracker::new());
        let pool = WorkerPool::start(test_engine(Arc::clone(&tracker)), 0, 2);
        let submitter = pool.submitter();

        assert_eq!(submitter.queued(), 0);
        submitter.submit(test_task(Uuid::new_v4())).unwrap();
        assert_eq!(submitter.queued(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_submission() {
        let tracker = Arc::new(JobTracker::new());
        // No workers, so nothing drains the queue.
        let pool = WorkerPool::start(test_engine(Arc::clone(&tracker)), 0, 1);
        let submitter = pool.submitter();

        submitter.submit(test_task(Uuid::new_v4())).unwrap();
        let err = submitter.submit(test_task(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, SubmitError::QueueFull));
    }

    #[tokio::test]
    async fn test_worker_drives_job_to_terminal_state() {
        let tracker = Arc::new(JobTracker::new());
        let pool = WorkerPool::start(test_engine(Arc::clone(&tracker)), 1, 4);
        let submitter = pool.submitter();

        let job_id = Uuid::new_v4();
        tracker.create(job_id).await;
        submitter.submit(test_task(job_id)).unwrap();

        // The unreachable database fails the job almost immediately.
        let mut status = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let snapshot = tracker.get(job_id).await.unwrap();
            if snapshot.status.is_terminal() {
                status = Some(snapshot);
                break;
            }
        }

        let snapshot = status.expect("job never reached a terminal state");
        assert_eq!(snapshot.status, domain::models::JobStatus::Failed);
        assert!(snapshot.error.is_some());

        pool.shutdown();
        pool.wait_for_shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_workers() {
        let tracker = Arc::new(JobTracker::new());
        let pool = WorkerPool::start(test_engine(tracker), 2, 4);

        pool.shutdown();
        pool.wait_for_shutdown(Duration::from_secs(2)).await;
    }
}
