// Concurrency-limited execution queue.
//
// Each render session is a whole browser tab, so only a few may be open at
// once. Work beyond the limit waits in a FIFO list and is admitted as slots
// free up. A finishing task hands its slot straight to the head of the list,
// so the active count never dips below the limit while work is waiting.
//
// The active count and the waiting list live under one mutex; the lock is
// never held across an await.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default number of simultaneously active tasks.
pub const DEFAULT_MAX_ACTIVE: usize = 3;

/// Bounded, FIFO-admission task queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct ExecutionQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    limit: usize,
    state: Mutex<QueueState>,
}

struct QueueState {
    active: usize,
    waiting: VecDeque<oneshot::Sender<Slot>>,
}

/// Ownership of one execution slot. Dropping it releases the slot, whether
/// the task finished, failed, panicked, or was never polled.
struct Slot {
    inner: Option<Arc<QueueInner>>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            QueueInner::release(&inner);
        }
    }
}

enum Admission {
    Ready(Slot),
    Queued(oneshot::Receiver<Slot>),
}

impl QueueInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(self: &Arc<Self>) -> Admission {
        let mut state = self.lock();
        if state.active < self.limit {
            state.active += 1;
            Admission::Ready(Slot {
                inner: Some(Arc::clone(self)),
            })
        } else {
            let (tx, rx) = oneshot::channel();
            state.waiting.push_back(tx);
            debug!(waiting = state.waiting.len(), "Execution queue full, task queued");
            Admission::Queued(rx)
        }
    }

    fn release(self: &Arc<Self>) {
        let mut state = self.lock();
        while let Some(next) = state.waiting.pop_front() {
            let slot = Slot {
                inner: Some(Arc::clone(self)),
            };
            match next.send(slot) {
                Ok(()) => return,
                // Waiter went away; disarm the slot and try the next one
                Err(mut slot) => {
                    slot.inner = None;
                }
            }
        }
        state.active = state.active.saturating_sub(1);
    }
}

impl ExecutionQueue {
    /// Create a queue allowing `limit` concurrently active tasks (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                limit: limit.max(1),
                state: Mutex::new(QueueState {
                    active: 0,
                    waiting: VecDeque::new(),
                }),
            }),
        }
    }

    /// Submit a task. It starts right away if a slot is free, otherwise it
    /// waits its turn behind everything submitted before it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F, T>(&self, task: F) -> QueuedTask<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let admission = self.inner.admit();

        let handle = tokio::spawn(async move {
            let _slot = match admission {
                Admission::Ready(slot) => slot,
                Admission::Queued(rx) => rx
                    .await
                    .context("Execution queue dropped a waiting task")?,
            };
            task.await
        });

        QueuedTask { handle }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Number of tasks currently holding a slot.
    pub fn active(&self) -> usize {
        self.inner.lock().active
    }

    /// Number of tasks waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.inner.lock().waiting.len()
    }
}

impl Default for ExecutionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE)
    }
}

/// Completion handle for a submitted task.
pub struct QueuedTask<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> QueuedTask<T> {
    /// Wait for the task to be admitted and finish. A panic inside the task
    /// is reported as an error.
    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("Queued task did not complete: {e}")),
        }
    }
}
