use super::body::TaskBody;
use super::config::TaskConfig;
use super::error::{ErrorHandlerFailure, TaskError};
use super::started::Started;
use crate::server::metrics;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

/// The point of the request lifecycle at which a task is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Started as soon as it is scheduled, concurrently with the handler.
    Immediate,
    /// Started once the handler has returned.
    AfterRoute,
    /// Started once the response has been sent.
    AfterResponse,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Immediate => "immediate",
            Phase::AfterRoute => "after_route",
            Phase::AfterResponse => "after_response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single task invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The body failed; the error was logged and passed to `on_error`.
    Failed,
    /// The task group shut down before the (non-shielded) task finished.
    Cancelled,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
            TaskOutcome::Cancelled => "cancelled",
        }
    }
}

/// Handle to a scheduled unit of work.
///
/// Holds the task's identity, its fully merged config and its `started`
/// signal. Cloning is cheap and every clone observes the same signal.
#[derive(Debug, Clone)]
pub struct Task {
    id: Uuid,
    function: &'static str,
    phase: Phase,
    config: Arc<TaskConfig>,
    started: Started,
}

impl Task {
    pub(crate) fn new(function: &'static str, phase: Phase, config: TaskConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            function,
            phase,
            config: Arc::new(config),
            started: Started::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Type name of the scheduled callable.
    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Set once the task has been handed to the [`TaskGroup`](super::TaskGroup)
    /// for execution, before its body is first polled.
    ///
    /// A non-shielded task cancelled by shutdown before it was polled still
    /// reports as started. Tasks that are never handed over (discarded, or
    /// scheduled after their checkpoint) never do.
    pub fn started(&self) -> &Started {
        &self.started
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {} [{}] ({}, {})",
            self.name().unwrap_or("<unnamed>"),
            self.id,
            self.function,
            self.phase
        )
    }
}

/// A task that has been built but not started yet.
pub struct PendingTask {
    task: Task,
    body: TaskBody,
}

impl PendingTask {
    pub(crate) fn new(task: Task, body: TaskBody) -> Self {
        Self { task, body }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Run the task to its end.
    ///
    /// Non-shielded tasks stop as soon as `cancel` fires; shielded tasks,
    /// including their error handler, ignore it.
    pub(crate) async fn invoke(self, cancel: CancellationToken) -> TaskOutcome {
        let PendingTask { task, body } = self;
        task.started.set();

        let start_time = Instant::now();
        let outcome = if task.config.shielded() {
            execute(&task, body).await
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("{} was cancelled after {:?}", task, start_time.elapsed());
                    TaskOutcome::Cancelled
                }
                outcome = execute(&task, body) => outcome,
            }
        };

        metrics::record_task_finished(task.phase, outcome, start_time.elapsed());
        outcome
    }
}

async fn execute(task: &Task, body: TaskBody) -> TaskOutcome {
    let error = match body.call().await {
        Ok(()) => {
            debug!("{} completed", task);
            return TaskOutcome::Completed;
        }
        Err(failure) => Arc::new(TaskError::from(failure)),
    };

    error!("{} failed: {}", task, error);

    if let Some(on_error) = &task.config.on_error {
        if let Err(failure) = on_error.call(task.clone(), Arc::clone(&error)).await {
            let failure = ErrorHandlerFailure::from(failure);
            metrics::record_error_handler_failure();
            error!("Error handler of {} failed: {}", task, failure);
        }
    }

    TaskOutcome::Failed
}
