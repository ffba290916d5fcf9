//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, TEST_AUTHOR, TEST_TEXT};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_post_message() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.post_message(TEST_AUTHOR, TEST_TEXT).await;
//!     assert_eq!(response.status(), StatusCode::CREATED);
//! }
//! ```

mod client;
mod constants;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
pub use server::TestServer;
