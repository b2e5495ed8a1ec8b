//! Bounded worker pool for listener notifications.
//!
//! Backed by a dedicated multi-thread tokio runtime with a fixed number of
//! worker threads. Jobs beyond the pool size wait in the runtime's task queue.

use crate::bus::BusError;
use parking_lot::Mutex;
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed-size pool executing synchronous jobs.
pub(crate) struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    handle: PoolHandle,
    size: usize,
}

/// Cloneable submission side of a [`WorkerPool`].
#[derive(Clone)]
pub(crate) struct PoolHandle {
    runtime: Handle,
    closed: CancellationToken,
}

impl WorkerPool {
    /// Start `size` worker threads named `{thread_name}-worker`.
    pub(crate) fn new(size: usize, thread_name: &str) -> Result<Self, BusError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(size)
            .thread_name(format!("{thread_name}-worker"))
            .build()
            .map_err(BusError::Spawn)?;
        let handle = PoolHandle {
            runtime: runtime.handle().clone(),
            closed: CancellationToken::new(),
        };

        debug!(workers = size, "Worker pool started");

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            size,
        })
    }

    /// Number of worker threads.
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Stop the pool without waiting.
    ///
    /// Queued jobs are discarded and running jobs are abandoned. Safe to call
    /// more than once and from inside a job.
    pub(crate) fn shutdown_now(&self) {
        self.handle.closed.cancel();
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            debug!(workers = self.size, "Worker pool shut down");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_shut_down(&self) -> bool {
        self.handle.closed.is_cancelled()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // A plain runtime drop blocks, which panics inside async contexts.
        self.shutdown_now();
    }
}

impl PoolHandle {
    /// Queue a job. Never waits for a free worker.
    ///
    /// A job still queued when the pool shuts down is dropped without running.
    pub(crate) fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.is_cancelled() {
            return;
        }
        let closed = self.closed.clone();
        // Fire-and-forget: the JoinHandle is not kept.
        drop(self.runtime.spawn(async move {
            if !closed.is_cancelled() {
                job();
            }
        }));
    }

    /// Drive `future` to completion on the calling thread.
    ///
    /// Must be called from a thread outside the pool.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
