use super::body::{Failure, TaskBody, TaskReturn};
use super::error::TaskError;
use super::task::Task;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type HandlerFn =
    dyn Fn(Task, Arc<TaskError>) -> BoxFuture<'static, Result<(), Failure>> + Send + Sync;

/// Callback invoked with the failing task and its error.
///
/// Like task bodies, handlers may be asynchronous ([`ErrorHandler::new`]) or
/// blocking ([`ErrorHandler::blocking`]). Two handlers are equal only if they
/// are clones of the same handler.
#[derive(Clone)]
pub struct ErrorHandler(Arc<HandlerFn>);

impl ErrorHandler {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Task, Arc<TaskError>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: TaskReturn,
    {
        let handler = Arc::new(handler);
        Self(Arc::new(move |task, error| {
            let handler = Arc::clone(&handler);
            TaskBody::from_async(move || handler(task, error))
                .call()
                .boxed()
        }))
    }

    /// A synchronous handler, run on the blocking thread pool.
    pub fn blocking<F, R>(handler: F) -> Self
    where
        F: Fn(&Task, &TaskError) -> R + Send + Sync + 'static,
        R: TaskReturn,
    {
        let handler = Arc::new(handler);
        Self(Arc::new(move |task, error| {
            let handler = Arc::clone(&handler);
            TaskBody::from_blocking(move || handler(&task, &*error))
                .call()
                .boxed()
        }))
    }

    pub(crate) fn call(
        &self,
        task: Task,
        error: Arc<TaskError>,
    ) -> BoxFuture<'static, Result<(), Failure>> {
        (self.0)(task, error)
    }
}

impl PartialEq for ErrorHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorHandler({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Per-task settings.
///
/// Every field is optional so configs can be layered: a process-wide default,
/// then whatever a call site overrides. `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskConfig {
    pub name: Option<String>,
    pub shield: Option<bool>,
    pub on_error: Option<ErrorHandler>,
}

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_shield(mut self, shield: bool) -> Self {
        self.shield = Some(shield);
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = Some(on_error);
        self
    }

    /// Whether the task runs to completion even when the task group shuts down.
    pub fn shielded(&self) -> bool {
        self.shield.unwrap_or(false)
    }

    /// Layer `other` on top of `self`: each field set in `other` wins,
    /// unset fields keep the value from `self`. Neither operand is modified.
    pub fn merge(&self, other: &TaskConfig) -> TaskConfig {
        TaskConfig {
            name: other.name.clone().or_else(|| self.name.clone()),
            shield: other.shield.or(self.shield),
            on_error: other.on_error.clone().or_else(|| self.on_error.clone()),
        }
    }
}
