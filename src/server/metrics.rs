use crate::tasks::{Phase, TaskOutcome};
use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all request-tasks metrics
const PREFIX: &str = "request_tasks";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Task Metrics
    pub static ref TASKS_STARTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_tasks_started_total"), "Tasks started, by lifecycle phase"),
        &["phase"]
    ).expect("Failed to create tasks_started_total metric");

    pub static ref TASKS_FINISHED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_tasks_finished_total"), "Tasks finished, by outcome"),
        &["phase", "outcome"]
    ).expect("Failed to create tasks_finished_total metric");

    pub static ref TASKS_RUNNING: IntGauge = IntGauge::new(
        format!("{PREFIX}_tasks_running"),
        "Number of tasks currently running"
    ).expect("Failed to create tasks_running metric");

    pub static ref TASK_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_task_duration_seconds"),
            "Task run time in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["phase"]
    ).expect("Failed to create task_duration_seconds metric");

    pub static ref ERROR_HANDLER_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_error_handler_failures_total"),
        "Error handlers that failed themselves"
    ).expect("Failed to create error_handler_failures_total metric");

    pub static ref TASK_FAILURE_REPORTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_task_failure_reports_total"), "Task failures reported by the server's error handler"),
        &["task"]
    ).expect("Failed to create task_failure_reports_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (tests call this repeatedly)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(TASKS_STARTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TASKS_FINISHED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TASKS_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(TASK_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ERROR_HANDLER_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TASK_FAILURE_REPORTS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_task_started(phase: Phase) {
    TASKS_STARTED_TOTAL
        .with_label_values(&[phase.as_str()])
        .inc();
    TASKS_RUNNING.inc();
}

pub fn record_task_finished(phase: Phase, outcome: TaskOutcome, duration: Duration) {
    TASKS_FINISHED_TOTAL
        .with_label_values(&[phase.as_str(), outcome.as_str()])
        .inc();
    TASK_DURATION_SECONDS
        .with_label_values(&[phase.as_str()])
        .observe(duration.as_secs_f64());
    TASKS_RUNNING.dec();
}

pub fn record_error_handler_failure() {
    ERROR_HANDLER_FAILURES_TOTAL.inc();
}

pub fn record_task_failure_report(task_name: &str) {
    TASK_FAILURE_REPORTS_TOTAL
        .with_label_values(&[task_name])
        .inc();
}

/// Number of tasks started in `phase` since the process started.
pub fn tasks_started(phase: Phase) -> u64 {
    TASKS_STARTED_TOTAL
        .with_label_values(&[phase.as_str()])
        .get() as u64
}

/// Number of tasks that ended with `outcome`, across phases.
pub fn tasks_finished(outcome: TaskOutcome) -> u64 {
    [Phase::Immediate, Phase::AfterRoute, Phase::AfterResponse]
        .iter()
        .map(|phase| {
            TASKS_FINISHED_TOTAL
                .with_label_values(&[phase.as_str(), outcome.as_str()])
                .get() as u64
        })
        .sum()
}

pub fn tasks_running() -> i64 {
    TASKS_RUNNING.get()
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
