//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per demo server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Request failed")
    }

    /// GET /
    pub async fn get_stats(&self) -> Response {
        self.get("/").await
    }

    /// GET /metrics
    pub async fn get_metrics(&self) -> Response {
        self.get("/metrics").await
    }

    /// POST /v1/messages
    pub async fn post_message(&self, author: &str, text: &str) -> Response {
        self.client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&json!({ "author": author, "text": text }))
            .send()
            .await
            .expect("Post message request failed")
    }

    /// GET /v1/messages/{id}
    pub async fn get_message(&self, id: u64) -> Response {
        self.get(&format!("/v1/messages/{}", id)).await
    }

    /// Polls message `id` until `done` accepts it
    ///
    /// # Panics
    ///
    /// Panics if the message does not reach the expected state in time.
    pub async fn wait_for_message(&self, id: u64, done: impl Fn(&Value) -> bool) -> Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(TASKS_SETTLE_TIMEOUT_MS);

        loop {
            let response = self.get_message(id).await;
            if response.status().is_success() {
                let message: Value = response.json().await.expect("Invalid message JSON");
                if done(&message) {
                    return message;
                }
            }
            if start.elapsed() > timeout {
                panic!("Message {} did not reach the expected state in time", id);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
