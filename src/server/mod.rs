pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;
mod tasks;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, report_task_failure, run_server};
pub use tasks::{add_tasks, Tasks};
