use super::body::Failure;
use super::lifecycle::LifecycleState;
use std::fmt::{Debug, Display};
use thiserror::Error;

/// A scheduler was requested while no task group is available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitializationError {
    #[error("task group must be created from within a tokio runtime")]
    NoRuntime,

    #[error("task group is not running: the tasks lifespan has not been started")]
    NotStarted,

    #[error("task group has been shut down")]
    ShutDown,

    #[error("request tasks used on a route that is not wrapped by the tasks layer")]
    MissingLayer,
}

/// The body of a scheduled task failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Downcast the error returned by the task body.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self {
            TaskError::Failed(err) => err.downcast_ref::<E>(),
            TaskError::Panicked(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }
}

impl From<Failure> for TaskError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Error(err) => TaskError::Failed(err),
            Failure::Panic(msg) => TaskError::Panicked(msg),
        }
    }
}

/// A task's error handler itself failed. Only ever logged.
#[derive(Debug, Error)]
pub enum ErrorHandlerFailure {
    #[error("error handler failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("error handler panicked: {0}")]
    Panicked(String),
}

impl From<Failure> for ErrorHandlerFailure {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Error(err) => ErrorHandlerFailure::Failed(err),
            Failure::Panic(msg) => ErrorHandlerFailure::Panicked(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("invalid request lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}
