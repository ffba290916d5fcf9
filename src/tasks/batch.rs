use super::body::TaskReturn;
use super::config::TaskConfig;
use super::group::TaskGroup;
use super::scheduler::{TaskBuilder, TaskSink};
use super::task::{PendingTask, Phase, Task};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchStatus {
    Open,
    Released,
    Discarded,
}

struct BatchState {
    status: BatchStatus,
    scheduled: Vec<PendingTask>,
}

struct BatchInner {
    phase: Phase,
    config: TaskConfig,
    state: Mutex<BatchState>,
}

/// Tasks collected during a request and started together at one lifecycle
/// checkpoint.
///
/// Tasks are started in the order they were scheduled. Once the batch has
/// been released (or discarded) newly scheduled tasks are never started.
#[derive(Clone)]
pub struct TaskBatch {
    inner: Arc<BatchInner>,
}

impl TaskBatch {
    pub(crate) fn new(phase: Phase, config: TaskConfig) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                phase,
                config,
                state: Mutex::new(BatchState {
                    status: BatchStatus::Open,
                    scheduled: Vec::new(),
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BatchState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase
    }

    pub fn config(&self) -> &TaskConfig {
        &self.inner.config
    }

    pub fn schedule<F, Fut>(&self, func: F) -> Task
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: TaskReturn,
    {
        self.task().schedule(func)
    }

    pub fn schedule_blocking<F, R>(&self, func: F) -> Task
    where
        F: FnOnce() -> R + Send + 'static,
        R: TaskReturn,
    {
        self.task().schedule_blocking(func)
    }

    pub fn task(&self) -> TaskBuilder<'_> {
        TaskBuilder::new(&self.inner.config, self)
    }

    /// Tasks waiting for the batch to be released, in scheduling order.
    pub fn scheduled(&self) -> Vec<Task> {
        self.state()
            .scheduled
            .iter()
            .map(|pending| pending.task().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the batch's checkpoint has passed.
    pub fn is_closed(&self) -> bool {
        self.state().status != BatchStatus::Open
    }

    /// Hand every scheduled task to `group`, in scheduling order.
    ///
    /// Only the first call releases anything. Returns the number of tasks
    /// handed over.
    pub fn release(&self, group: &TaskGroup) -> usize {
        let scheduled = {
            let mut state = self.state();
            match state.status {
                BatchStatus::Open => {}
                BatchStatus::Released => {
                    warn!("{} tasks were already released", self.inner.phase);
                    return 0;
                }
                BatchStatus::Discarded => {
                    debug!("{} tasks were discarded, nothing to release", self.inner.phase);
                    return 0;
                }
            }
            state.status = BatchStatus::Released;
            std::mem::take(&mut state.scheduled)
        };

        let count = scheduled.len();
        if count > 0 {
            debug!("Releasing {} {} tasks", count, self.inner.phase);
        }
        for pending in scheduled {
            group.run(pending);
        }
        count
    }

    /// Close the batch without starting its tasks. Returns how many were dropped.
    pub fn discard(&self) -> usize {
        let dropped = {
            let mut state = self.state();
            if state.status != BatchStatus::Open {
                return 0;
            }
            state.status = BatchStatus::Discarded;
            std::mem::take(&mut state.scheduled)
        };

        if !dropped.is_empty() {
            warn!(
                "Discarding {} {} tasks without running them",
                dropped.len(),
                self.inner.phase
            );
        }
        dropped.len()
    }
}

impl TaskSink for TaskBatch {
    fn phase(&self) -> Phase {
        self.inner.phase
    }

    fn submit(&self, pending: PendingTask) -> Task {
        let task = pending.task().clone();
        let mut state = self.state();
        if state.status == BatchStatus::Open {
            state.scheduled.push(pending);
        } else {
            warn!(
                "{} scheduled after its checkpoint has passed, it will not run",
                task
            );
        }
        task
    }
}

impl fmt::Debug for TaskBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TaskBatch")
            .field("phase", &self.inner.phase)
            .field("status", &state.status)
            .field("scheduled", &state.scheduled.len())
            .finish()
    }
}
