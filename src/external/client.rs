use std::time::Duration;

use crate::error::{AppError, AppResult};

/// User-Agent sent with every outbound request. GitHub rejects requests
/// without one.
pub fn user_agent() -> String {
    format!("runwatch/{}", crate::pkg_version())
}

/// Build a pooled HTTP client with the given request timeout.
///
/// Each remote service gets its own client so that timeouts stay per-service.
pub fn build_http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .gzip(true)
        .user_agent(user_agent())
        .build()
        .map_err(|e| AppError::Internal {
            source: anyhow::Error::new(e).context("failed to build HTTP client"),
        })
}
