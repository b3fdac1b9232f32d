//! Task executors for handler invocations.
//!
//! The dispatcher never awaits a handler itself. It hands the invocation to
//! an [`Executor`]:
//!
//! - [`TokioExecutor`] spawns onto the tokio runtime, bounded by a semaphore.
//! - [`ManualExecutor`] queues tasks until [`ManualExecutor::run_until_idle`]
//!   is awaited, so tests can drive dispatch one step at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::{BusError, Result};
use crate::handler::BoxFuture;

/// Something that can run handler invocations in the background.
pub trait Executor: Send + Sync + 'static {
    /// Start a task. Returns an error if the task cannot be accepted.
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<()>;
}

/// Executor backed by `tokio::spawn` with a concurrency limit.
///
/// Must be used from within a tokio runtime.
pub struct TokioExecutor {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl TokioExecutor {
    /// Create an executor allowing at most `limit` tasks in flight.
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Number of tasks that can still be started right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<()> {
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| BusError::Overloaded(self.limit))?;

        tokio::spawn(async move {
            // Permit is held until the task completes
            let _permit = permit;
            task.await;
        });
        Ok(())
    }
}

/// Executor that queues tasks and runs them only when asked.
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<VecDeque<BoxFuture<'static, ()>>>,
}

impl ManualExecutor {
    /// Create an empty executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued tasks one after another, in spawn order, until the queue
    /// is empty. Tasks spawned while running are run too.
    ///
    /// Returns the number of tasks run.
    pub async fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Executor for ManualExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<()> {
        self.queue.lock().push_back(task);
        Ok(())
    }
}
