//! Poll-once command handler
//!
//! Runs one fetch and normalize for a single source and prints every
//! notification as a JSON line on stdout.

use std::io::Write;

use jiff::{SignedDuration, Timestamp};

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::sources::{describe, poll_source_once};

pub struct PollOnceCommandHandler {
    config: Settings,
}

impl PollOnceCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, source_id: &str, since: Option<Timestamp>) -> AppResult<usize> {
        let mut buf = Vec::new();
        let count = self.execute_to(source_id, since, &mut buf).await?;
        std::io::stdout()
            .write_all(&buf)
            .map_err(|e| AppError::Internal { source: e.into() })?;
        Ok(count)
    }

    /// Writes the notifications to `out` and returns how many there were.
    pub async fn execute_to<W: Write>(
        &self,
        source_id: &str,
        since: Option<Timestamp>,
        out: &mut W,
    ) -> AppResult<usize> {
        let since = match since {
            Some(since) => since,
            None => self.default_since(source_id)?,
        };
        tracing::info!(source_id, since = %since, "Polling source once");

        let notifications = poll_source_once(&self.config, source_id, since).await?;
        for notification in &notifications {
            let line = serde_json::to_string(notification).map_err(|e| AppError::Internal {
                source: e.into(),
            })?;
            writeln!(out, "{}", line).map_err(|e| AppError::Internal { source: e.into() })?;
        }
        Ok(notifications.len())
    }

    /// One interval of the source before now.
    fn default_since(&self, source_id: &str) -> AppResult<Timestamp> {
        let descriptor = describe(&self.config)
            .into_iter()
            .find(|d| d.id == source_id)
            .ok_or_else(|| AppError::NotFound {
                entity: "source".to_string(),
                field: "id".to_string(),
                value: source_id.to_string(),
            })?;

        let now = Timestamp::now();
        Ok(SignedDuration::try_from(descriptor.interval)
            .ok()
            .and_then(|interval| now.checked_sub(interval).ok())
            .unwrap_or(now))
    }
}
