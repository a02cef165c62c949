//! Task queue used as the status sink for batch inserts.
//!
//! Batches for one logical operation run as parallel tasks that share a
//! single [`TaskQueue`]. Tasks have no return channel; they report failure
//! through [`TaskQueue::set_status`], and the first error recorded is the
//! one the orchestrator sees.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{LinkError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared status sink and task list for one group of batch operations.
#[derive(Default)]
pub struct TaskQueue {
    status: Mutex<Option<LinkError>>,
    tasks: Mutex<Vec<Task>>,
}

impl TaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first error wins; later calls are ignored.
    pub fn set_status(&self, error: LinkError) {
        let mut status = lock(&self.status);
        if status.is_none() {
            *status = Some(error);
        }
    }

    /// The first recorded failure, if any.
    ///
    /// # Errors
    ///
    /// Returns a clone of the first error passed to [`set_status`](Self::set_status).
    pub fn status(&self) -> Result<()> {
        match &*lock(&self.status) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        lock(&self.tasks).push(Box::new(task));
    }

    /// Run every queued task on the rayon pool and wait for all of them.
    pub fn dispatch_and_wait(&self) {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        tracing::debug!(tasks = tasks.len(), "dispatching queued tasks");
        rayon::scope(|scope| {
            for task in tasks {
                scope.spawn(move |_| task());
            }
        });
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("status", &*lock(&self.status))
            .field("pending", &lock(&self.tasks).len())
            .finish()
    }
}

// A panicking task must not hide the status of the others.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
