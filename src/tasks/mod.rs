//! Request-scoped background task scheduling.
//!
//! A request handler can defer work to three points of the request lifecycle:
//! right away (concurrently with the handler), after the handler has returned,
//! and after the response has been sent. Every task runs inside the single
//! process-wide [`TaskGroup`], owned by [`TasksLifespan`].

mod batch;
mod body;
mod config;
mod error;
mod group;
mod lifecycle;
mod lifespan;
mod scheduler;
mod started;
mod task;

pub use batch::TaskBatch;
pub use body::TaskReturn;
pub use config::{ErrorHandler, TaskConfig};
pub use error::{ErrorHandlerFailure, InitializationError, LifecycleError, TaskError};
pub use group::TaskGroup;
pub use lifecycle::{DeferredTasksPolicy, LifecycleState, RequestLifecycle, RouteOutcome};
pub use lifespan::TasksLifespan;
pub use scheduler::{TaskBuilder, TaskScheduler};
pub use started::Started;
pub use task::{PendingTask, Phase, Task, TaskOutcome};
