//! Run command handler
//!
//! Starts every enabled source plus the notification dispatcher and keeps
//! them running until Ctrl-C.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::sources::render_table;
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::poller::{ChannelSink, SourceRegistry};
use crate::services::notifications::DispatchStats;
use crate::services::NotificationService;
use crate::sources::{describe, register_enabled};

pub struct RunCommandHandler {
    config: Settings,
}

impl RunCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
            }
        };
        self.run_until(shutdown).await.map(|_| ())
    }

    /// Validate configuration and delivery providers without polling.
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;
        let service = NotificationService::from_settings(&self.config.delivery)?;

        println!("✓ Configuration is valid");
        println!(
            "✓ Delivery providers: {}",
            service.providers().collect::<Vec<_>>().join(", ")
        );
        print!("{}", render_table(&describe(&self.config)));
        println!("Dry run completed successfully");
        Ok(())
    }

    /// Runs sources and dispatcher until `shutdown` resolves, then stops the
    /// pollers first and lets the dispatcher drain what they queued.
    pub async fn run_until<F>(&self, shutdown: F) -> AppResult<DispatchStats>
    where
        F: Future<Output = ()>,
    {
        let service = NotificationService::from_settings(&self.config.delivery)?;
        if service.is_empty() {
            tracing::warn!("No delivery provider enabled, notifications will be dropped");
        }

        let (sink, rx) = ChannelSink::channel();
        let registry = SourceRegistry::new(Arc::new(sink));
        let cancel = CancellationToken::new();
        let dispatcher = tokio::spawn({
            let cancel = cancel.clone();
            async move { service.run(rx, cancel).await }
        });

        let started = match register_enabled(&self.config, &registry) {
            Ok(started) => started,
            Err(e) => {
                registry.shutdown().await;
                cancel.cancel();
                let _ = dispatcher.await;
                return Err(e);
            }
        };
        if started == 0 {
            tracing::warn!("No poll source is enabled");
        }

        tracing::info!(
            app = %self.config.application.name,
            version = crate::pkg_version(),
            sources = started,
            "runwatch started"
        );

        shutdown.await;
        tracing::info!("Shutdown requested");

        registry.shutdown().await;
        drop(registry);
        cancel.cancel();

        dispatcher.await.map_err(|e| AppError::Internal {
            source: anyhow::anyhow!("notification dispatcher panicked: {}", e),
        })
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_dry_run_with_defaults() {
        let handler = RunCommandHandler::new(Settings::default());
        assert!(handler.validate_only().is_ok());
    }

    #[test]
    fn test_dry_run_rejects_invalid_config() {
        let mut config = Settings::default();
        config.sources.user_alerts.interval_ms = 0;
        let handler = RunCommandHandler::new(config);
        assert!(matches!(
            handler.validate_only(),
            Err(AppError::Configuration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_delivers_everything_polled_before_shutdown() {
        let handler = RunCommandHandler::new(Settings::default());

        // user alerts every 10s fire at 10, 20, 30; alerts every 30s fire at 30.
        let stats = handler
            .run_until(tokio::time::sleep(Duration::from_secs(35)))
            .await
            .unwrap();

        assert_eq!(stats.received, 4);
        assert_eq!(stats.delivered, 4);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_with_no_sources() {
        let mut config = Settings::default();
        config.sources.alerts.enabled = false;
        config.sources.user_alerts.enabled = false;
        let handler = RunCommandHandler::new(config);

        let stats = handler
            .run_until(tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(stats, DispatchStats::default());
    }
}
