//! Worker pool — a set of threads running the poll loop.
//!
//! Shutdown stops new polls; an in-flight batch either finishes (state
//! persisted, message deleted) or leaves its messages unacknowledged for
//! redelivery after the visibility timeout. The handle joins its threads
//! on `Drop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::PipelineWorker;

/// Pause after a failed poll so a dead queue doesn't spin the loop.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Handle for a running worker pool.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on
/// `Drop`. Store this in the hosting process's state for the lifetime of
/// the service.
pub struct WorkerPoolHandle {
    shutdown: Arc<AtomicBool>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Request graceful shutdown. In-flight batches complete, but no new
    /// polls are started.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for WorkerPoolHandle {
    fn drop(&mut self) {
        self.shutdown();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Start `worker.config().worker_count` threads polling the queue.
pub fn start_worker_pool(worker: Arc<PipelineWorker>) -> WorkerPoolHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let count = worker.config().worker_count.max(1);

    let handles = (0..count)
        .map(|index| {
            let worker = worker.clone();
            let flag = shutdown.clone();
            std::thread::Builder::new()
                .name(format!("doctran-worker-{index}"))
                .spawn(move || worker_loop(index, &worker, &flag))
                .expect("failed to spawn worker thread")
        })
        .collect();

    WorkerPoolHandle { shutdown, handles }
}

fn worker_loop(index: usize, worker: &PipelineWorker, shutdown: &AtomicBool) {
    tracing::info!(worker = index, "Pipeline worker started");

    while !shutdown.load(Ordering::Relaxed) {
        match worker.poll_and_process() {
            Ok(outcome) if outcome.received > 0 => {
                tracing::debug!(
                    worker = index,
                    received = outcome.received,
                    acked = outcome.acked,
                    retried = outcome.retried,
                    dead_lettered = outcome.dead_lettered,
                    "Processed batch"
                );
            }
            Ok(_) => {} // empty poll, loop again
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Poll failed");
                std::thread::sleep(POLL_ERROR_BACKOFF);
            }
        }
    }

    tracing::info!(worker = index, "Pipeline worker stopped");
}
