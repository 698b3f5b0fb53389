//! `/api/v1/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered user sessions.
    pub users: usize,
    /// Registered radio sessions.
    pub radios: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, users: usize, radios: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        users,
        radios,
    }
}
