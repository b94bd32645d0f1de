//! Notification service for delivery.
//!
//! Drains the notification channel fed by the pollers and hands every
//! notification to each configured provider.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use super::log_provider::LogProvider;
use super::provider::NotificationProvider;
use super::webhook_provider::WebhookProvider;
use crate::config::DeliveryConfig;
use crate::error::AppResult;
use crate::models::Notification;

/// Counters reported when [`NotificationService::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Fans notifications out to a fixed set of providers
#[derive(Clone)]
pub struct NotificationService {
    providers: Vec<Arc<dyn NotificationProvider>>,
}

impl NotificationService {
    pub fn new(providers: Vec<Arc<dyn NotificationProvider>>) -> Self {
        Self { providers }
    }

    /// Builds the providers enabled in `config`, log first.
    pub fn from_settings(config: &DeliveryConfig) -> AppResult<Self> {
        let mut providers: Vec<Arc<dyn NotificationProvider>> = Vec::new();
        if config.log.enabled {
            providers.push(Arc::new(LogProvider::new()));
        }
        if config.webhook.enabled {
            providers.push(Arc::new(WebhookProvider::new(&config.webhook)?));
        }

        tracing::debug!(
            providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Notification providers configured"
        );
        Ok(Self::new(providers))
    }

    pub fn providers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(|provider| provider.name())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Sends `notification` to every provider concurrently.
    ///
    /// Returns true only if every provider reported success. Failures are
    /// logged and never propagated, so one bad provider cannot stall the
    /// others or the pollers.
    pub async fn dispatch(&self, notification: &Notification) -> bool {
        let results = join_all(
            self.providers
                .iter()
                .map(|provider| async move { (provider.name(), provider.send(notification).await) }),
        )
        .await;

        let mut all_ok = true;
        for (provider, result) in results {
            match result {
                Ok(delivery) if delivery.success => {
                    tracing::trace!(
                        provider,
                        id = %notification.id(),
                        duration_ms = delivery.duration_ms,
                        "Notification delivered"
                    );
                }
                Ok(delivery) => {
                    all_ok = false;
                    tracing::warn!(
                        provider,
                        id = %notification.id(),
                        status_code = ?delivery.status_code,
                        response = ?delivery.response,
                        "Notification delivery rejected"
                    );
                }
                Err(e) => {
                    all_ok = false;
                    tracing::warn!(
                        provider,
                        id = %notification.id(),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }
        all_ok
    }

    /// Dispatches notifications from `rx` until the channel closes or
    /// `cancel` fires. On cancellation, notifications already buffered in
    /// the channel are still delivered.
    pub async fn run(
        &self,
        mut rx: UnboundedReceiver<Notification>,
        cancel: CancellationToken,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();

        loop {
            let notification = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(notification) => notification,
                    None => {
                        tracing::debug!("Notification channel closed");
                        return stats;
                    }
                },
            };
            self.record(&notification, &mut stats).await;
        }

        rx.close();
        while let Ok(notification) = rx.try_recv() {
            self.record(&notification, &mut stats).await;
        }

        tracing::info!(
            received = stats.received,
            delivered = stats.delivered,
            failed = stats.failed,
            "Notification dispatcher stopped"
        );
        stats
    }

    async fn record(&self, notification: &Notification, stats: &mut DispatchStats) {
        stats.received += 1;
        if self.dispatch(notification).await {
            stats.delivered += 1;
        } else {
            stats.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::AppError;
    use crate::poller::MonotonicClock;
    use crate::services::notifications::DeliveryResult;

    /// Records every title it is asked to send.
    #[derive(Default)]
    struct RecordingProvider {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationProvider for RecordingProvider {
        async fn send(&self, notification: &Notification) -> AppResult<DeliveryResult> {
            self.sent
                .lock()
                .unwrap()
                .push(notification.metadata.title.clone());
            Ok(DeliveryResult::delivered(0))
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl NotificationProvider for FailingProvider {
        async fn send(&self, _notification: &Notification) -> AppResult<DeliveryResult> {
            Err(AppError::BadRequest {
                message: "unavailable".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn notification(title: &str) -> Notification {
        Notification::builder("alert", title, "message").build(&MonotonicClock::new())
    }

    #[test]
    fn test_from_settings_builds_enabled_providers() {
        let mut config = DeliveryConfig::default();
        let service = NotificationService::from_settings(&config).unwrap();
        assert_eq!(service.providers().collect::<Vec<_>>(), ["log"]);

        config.log.enabled = false;
        config.webhook.enabled = true;
        config.webhook.url = "http://127.0.0.1:9/hook".to_string();
        let service = NotificationService::from_settings(&config).unwrap();
        assert_eq!(service.providers().collect::<Vec<_>>(), ["webhook"]);

        config.webhook.enabled = false;
        assert!(NotificationService::from_settings(&config).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_reaches_healthy_provider_despite_failure() {
        let recording = Arc::new(RecordingProvider::default());
        let service = NotificationService::new(vec![Arc::new(FailingProvider), recording.clone()]);

        let ok = service.dispatch(&notification("one")).await;
        assert!(!ok);
        assert_eq!(*recording.sent.lock().unwrap(), ["one"]);
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let recording = Arc::new(RecordingProvider::default());
        let service = NotificationService::new(vec![recording.clone()]);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(notification("a")).unwrap();
        tx.send(notification("b")).unwrap();
        drop(tx);

        let stats = service.run(rx, CancellationToken::new()).await;
        assert_eq!(
            stats,
            DispatchStats {
                received: 2,
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(*recording.sent.lock().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_drains_buffered_notifications_on_cancel() {
        let recording = Arc::new(RecordingProvider::default());
        let service = NotificationService::new(vec![recording.clone(), Arc::new(FailingProvider)]);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tx.send(notification("queued-1")).unwrap();
        tx.send(notification("queued-2")).unwrap();
        cancel.cancel();

        let stats = service.run(rx, cancel).await;
        assert_eq!(stats.received, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(*recording.sent.lock().unwrap(), ["queued-1", "queued-2"]);

        // The receiver was closed, so late senders observe it.
        assert!(tx.send(notification("late")).is_err());
    }
}
