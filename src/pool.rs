//! Fixed-size async worker pool.
//!
//! `workers` tasks pull jobs from one shared queue until it is empty. Each
//! result goes onto a channel sized to the job count, so a worker never
//! waits on the consumer; the channel is drained once every worker has
//! exited.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error};

pub struct WorkerPool {
    workers: usize,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// A pool running at most `workers` jobs at once (minimum 1).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Highest number of jobs seen in flight at once.
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Run `work` over every job and return the results in completion order.
    ///
    /// A job that panics is logged and contributes no result.
    pub async fn run<J, R, F, Fut>(&self, jobs: Vec<J>, work: F) -> Vec<R>
    where
        J: Send + 'static,
        R: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = mpsc::channel::<J>(total);
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<R>(total);
        let work = Arc::new(work);
        let mut set = JoinSet::new();

        for worker in 0..self.workers.min(total) {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let work = Arc::clone(&work);
            let active = Arc::clone(&self.active);
            let peak = Arc::clone(&self.peak);

            set.spawn(async move {
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some(job) = next else { break };

                    let in_flight = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(in_flight, Ordering::SeqCst);
                    let result = (*work)(job).await;
                    active.fetch_sub(1, Ordering::SeqCst);

                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
                debug!(worker, "worker idle, exiting");
            });
        }
        drop(result_tx);

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        results
    }
}
