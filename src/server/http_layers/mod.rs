mod request_tasks;
mod requests_logging;

pub use request_tasks::{track_request_tasks, TrackedBody};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
