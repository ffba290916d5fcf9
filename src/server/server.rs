use anyhow::{ensure, Context, Result};
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{add_tasks, log_requests, metrics, state::*, ServerConfig, Tasks};
use crate::messages::{count_words, MessageStore};
use crate::tasks::{ErrorHandler, Phase, Task, TaskError, TaskOutcome, TasksLifespan};

#[derive(Serialize)]
struct TaskStats {
    pub started_immediate: u64,
    pub started_after_route: u64,
    pub started_after_response: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub running: i64,
}

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub messages: usize,
    pub tasks: TaskStats,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct PostMessageBody {
    pub author: String,
    pub text: String,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        messages: state.messages.len(),
        tasks: TaskStats {
            started_immediate: metrics::tasks_started(Phase::Immediate),
            started_after_route: metrics::tasks_started(Phase::AfterRoute),
            started_after_response: metrics::tasks_started(Phase::AfterResponse),
            completed: metrics::tasks_finished(TaskOutcome::Completed),
            failed: metrics::tasks_finished(TaskOutcome::Failed),
            cancelled: metrics::tasks_finished(TaskOutcome::Cancelled),
            running: metrics::tasks_running(),
        },
    };
    Json(stats)
}

fn index_message(store: &MessageStore, id: u64, text: &str) -> Result<()> {
    let words = count_words(text);
    ensure!(words > 0, "message {} has nothing to index", id);
    ensure!(
        store.mark_indexed(id, words),
        "message {} disappeared before indexing",
        id
    );
    Ok(())
}

async fn notify_subscribers(store: GuardedMessageStore, id: u64) {
    // Stands in for a slow delivery call.
    tokio::time::sleep(Duration::from_millis(10)).await;
    if store.mark_notified(id) {
        info!("Subscribers notified of message {}", id);
    }
}

async fn post_message(
    tasks: Tasks,
    State(messages): State<GuardedMessageStore>,
    Json(body): Json<PostMessageBody>,
) -> Response {
    let message = messages.create(&body.author, &body.text);
    let id = message.id;

    let store = messages.clone();
    tasks
        .task()
        .name("index-message")
        .schedule_blocking(move || index_message(&store, id, &body.text));

    let store = messages.clone();
    let author = body.author;
    tasks
        .after_route()
        .task()
        .name("audit-message")
        .schedule(move || async move {
            info!("Message {} posted by {}", id, author);
            store.mark_audited(id);
        });

    let store = messages.clone();
    tasks
        .after_response()
        .task()
        .name("notify-subscribers")
        .shield(true)
        .schedule(move || notify_subscribers(store, id));

    (StatusCode::CREATED, Json(message)).into_response()
}

async fn get_message(
    State(messages): State<GuardedMessageStore>,
    Path(id): Path<u64>,
) -> Response {
    match messages.get(id) {
        Some(message) => Json(message).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Process-wide `on_error` handler: counts failures per task name.
pub fn report_task_failure() -> ErrorHandler {
    ErrorHandler::blocking(|task: &Task, error: &TaskError| {
        metrics::record_task_failure_report(task.name().unwrap_or("unnamed"));
        warn!("Reported failure of {}: {}", task, error);
    })
}

pub fn make_app(state: ServerState) -> Router {
    let message_routes: Router = Router::new()
        .route("/", post(post_message))
        .route("/{id}", get(get_message))
        .with_state(state.clone());

    let app: Router = Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state.clone())
        .nest("/v1/messages", message_routes);

    add_tasks(app, state.lifespan.clone())
        .layer(middleware::from_fn_with_state(state, log_requests))
}

/// Serve until `shutdown` resolves. The tasks lifespan is left running so the
/// caller can drain it once no more requests are in flight.
pub async fn run_server<F>(config: ServerConfig, lifespan: TasksLifespan, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = config.port;
    let app = make_app(ServerState::new(config, lifespan));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
