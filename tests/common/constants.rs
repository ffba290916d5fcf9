//! Shared constants for end-to-end tests

// ============================================================================
// Timeouts
// ============================================================================

/// How long to wait for a spawned server to answer its first request
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Timeout applied to every request made by the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// How long to wait for background tasks to leave a trace
pub const TASKS_SETTLE_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Test Data
// ============================================================================

pub const TEST_AUTHOR: &str = "ann";

pub const TEST_TEXT: &str = "background tasks are fun";

pub const TEST_TEXT_WORDS: u64 = 4;
