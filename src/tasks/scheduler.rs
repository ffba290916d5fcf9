use super::batch::TaskBatch;
use super::body::{TaskBody, TaskReturn};
use super::config::{ErrorHandler, TaskConfig};
use super::group::TaskGroup;
use super::task::{PendingTask, Phase, Task};
use std::future::Future;

/// Destination of tasks built by a [`TaskBuilder`].
pub(crate) trait TaskSink: Send + Sync {
    fn phase(&self) -> Phase;

    fn submit(&self, pending: PendingTask) -> Task;
}

/// Builds tasks with a config derived from an ambient config plus call-site
/// overrides.
///
/// ```ignore
/// tasks.task().name("send-email").shield(true).schedule(move || send_email(user));
/// ```
pub struct TaskBuilder<'a> {
    base: &'a TaskConfig,
    overrides: TaskConfig,
    sink: &'a dyn TaskSink,
}

impl<'a> TaskBuilder<'a> {
    pub(crate) fn new(base: &'a TaskConfig, sink: &'a dyn TaskSink) -> Self {
        Self {
            base,
            overrides: TaskConfig::default(),
            sink,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.overrides.name = Some(name.into());
        self
    }

    pub fn shield(mut self, shield: bool) -> Self {
        self.overrides.shield = Some(shield);
        self
    }

    pub fn on_error(mut self, on_error: ErrorHandler) -> Self {
        self.overrides.on_error = Some(on_error);
        self
    }

    /// Layer a whole config on top of the overrides collected so far.
    pub fn with_config(mut self, config: &TaskConfig) -> Self {
        self.overrides = self.overrides.merge(config);
        self
    }

    /// The config tasks scheduled through this builder will get.
    pub fn config(&self) -> TaskConfig {
        self.base.merge(&self.overrides)
    }

    /// Schedule an asynchronous callable, awaited in place when the task runs.
    pub fn schedule<F, Fut>(&self, func: F) -> Task
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: TaskReturn,
    {
        self.submit(std::any::type_name::<F>(), TaskBody::from_async(func))
    }

    /// Schedule a synchronous callable, run on the blocking thread pool.
    pub fn schedule_blocking<F, R>(&self, func: F) -> Task
    where
        F: FnOnce() -> R + Send + 'static,
        R: TaskReturn,
    {
        self.submit(std::any::type_name::<F>(), TaskBody::from_blocking(func))
    }

    fn submit(&self, function: &'static str, body: TaskBody) -> Task {
        let task = Task::new(function, self.sink.phase(), self.config());
        self.sink.submit(PendingTask::new(task, body))
    }
}

/// Per-request scheduler.
///
/// Tasks scheduled directly start right away inside the shared [`TaskGroup`];
/// [`after_route`](Self::after_route) and
/// [`after_response`](Self::after_response) collect tasks to start at the
/// matching lifecycle checkpoint. Clones share the same batches.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    group: TaskGroup,
    config: TaskConfig,
    after_route: TaskBatch,
    after_response: TaskBatch,
}

impl TaskScheduler {
    pub fn new(group: TaskGroup, config: TaskConfig) -> Self {
        Self {
            after_route: TaskBatch::new(Phase::AfterRoute, config.clone()),
            after_response: TaskBatch::new(Phase::AfterResponse, config.clone()),
            group,
            config,
        }
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn group(&self) -> &TaskGroup {
        &self.group
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
        TaskBuilder::new(&self.config, self)
    }

    /// Tasks started once the handler has returned.
    pub fn after_route(&self) -> &TaskBatch {
        &self.after_route
    }

    /// Tasks started once the response has been sent.
    pub fn after_response(&self) -> &TaskBatch {
        &self.after_response
    }
}

impl TaskSink for TaskScheduler {
    fn phase(&self) -> Phase {
        Phase::Immediate
    }

    fn submit(&self, pending: PendingTask) -> Task {
        self.group.run(pending)
    }
}
