use super::error::InitializationError;
use super::task::{PendingTask, Task};
use crate::server::metrics;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// The process-wide execution context every scheduled task runs in.
///
/// Cloning returns another handle to the same group.
#[derive(Debug, Clone)]
pub struct TaskGroup {
    runtime: Handle,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
    /// Read-held while a task is handed over, write-held while shutdown
    /// closes the group, so no task is spawned past the final wait.
    gate: Arc<RwLock<()>>,
}

impl TaskGroup {
    /// Create a group bound to the current tokio runtime.
    pub fn new() -> Result<Self, InitializationError> {
        let runtime = Handle::try_current().map_err(|_| InitializationError::NoRuntime)?;
        Ok(Self::with_runtime(runtime))
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime,
            cancel_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Start a task inside the group.
    ///
    /// The task's `started` signal is set before this returns, so tasks are
    /// started in the order they are handed to the group. Once shutdown has
    /// begun, tasks are no longer started.
    pub fn run(&self, pending: PendingTask) -> Task {
        let task = pending.task().clone();
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        if self.is_shutting_down() {
            warn!("Task group is shutting down, not starting {}", task);
            return task;
        }

        task.started().set();
        metrics::record_task_started(task.phase());
        debug!("Starting {}", task);

        self.tracker
            .spawn_on(pending.invoke(self.cancel_token.child_token()), &self.runtime);
        task
    }

    /// Number of tasks currently running in the group.
    pub fn running_tasks(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel every running task that is not shielded and wait until all
    /// tasks, shielded ones included, have returned.
    pub async fn shutdown(&self) {
        info!(
            "Shutting down task group ({} running tasks)...",
            self.tracker.len()
        );

        {
            let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
            self.cancel_token.cancel();
            self.tracker.close();
        }
        self.tracker.wait().await;

        info!("Task group shutdown complete");
    }
}
