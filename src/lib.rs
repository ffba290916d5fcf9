//! Request-scoped background tasks for axum services
//!
//! This library exposes the task scheduler, its axum binding and the demo
//! server's modules for testing and reuse.

pub mod config;
pub mod messages;
pub mod server;
pub mod tasks;

#[cfg(test)]
mod test_logging;

// Re-export commonly used types for convenience
pub use server::{add_tasks, run_server, RequestsLoggingLevel, Tasks};
pub use tasks::{
    DeferredTasksPolicy, ErrorHandler, Task, TaskConfig, TaskError, TaskScheduler, TasksLifespan,
};
