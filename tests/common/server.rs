//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own message store and tasks
//! lifespan.

use super::constants::*;
use axum::Router;
use request_tasks::server::state::ServerState;
use request_tasks::server::{make_app, report_task_failure, RequestsLoggingLevel, ServerConfig};
use request_tasks::tasks::{DeferredTasksPolicy, TaskConfig, TasksLifespan};
use std::time::Duration;
use tokio::net::TcpListener;

/// Test server instance
///
/// When dropped, the HTTP server gracefully shuts down. The tasks lifespan is
/// shut down by [`TestServer::shutdown`].
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Lifespan backing the server's request schedulers
    pub lifespan: TasksLifespan,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns the demo server with a started lifespan
    pub async fn spawn() -> Self {
        Self::spawn_with_policy(DeferredTasksPolicy::Release).await
    }

    pub async fn spawn_with_policy(policy: DeferredTasksPolicy) -> Self {
        let lifespan = TasksLifespan::new(TaskConfig::new().with_on_error(report_task_failure()))
            .with_deferred_policy(policy);
        lifespan.start().expect("Failed to start tasks lifespan");
        Self::spawn_demo(lifespan).await
    }

    /// Spawns the demo server around `lifespan`, started or not
    pub async fn spawn_demo(lifespan: TasksLifespan) -> Self {
        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port: 0,
        };
        let app = make_app(ServerState::new(config, lifespan.clone()));
        Self::spawn_app(app, lifespan).await
    }

    /// Spawns an arbitrary app on a random port
    ///
    /// The app must answer `GET /` with a success status, it is used as
    /// readiness probe.
    pub async fn spawn_app(app: Router, lifespan: TasksLifespan) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            lifespan,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling `/`
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Stops accepting requests, then shuts the tasks lifespan down
    #[allow(dead_code)]
    pub async fn shutdown(mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.lifespan.shutdown().await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
