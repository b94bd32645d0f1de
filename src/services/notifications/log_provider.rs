use async_trait::async_trait;

use super::provider::{DeliveryResult, NotificationProvider};
use crate::error::AppResult;
use crate::models::{Notification, Severity};

/// Writes each notification as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProvider;

impl LogProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationProvider for LogProvider {
    async fn send(&self, notification: &Notification) -> AppResult<DeliveryResult> {
        let targets = notification
            .spec
            .as_ref()
            .map(|spec| {
                spec.target_entity_refs
                    .iter()
                    .map(|entity| entity.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        macro_rules! emit {
            ($level:ident) => {
                tracing::$level!(
                    target: "runwatch::notifications",
                    id = %notification.id(),
                    kind = %notification.kind,
                    timestamp = %notification.timestamp(),
                    title = %notification.metadata.title,
                    targets = %targets,
                    "{}",
                    notification.metadata.message
                )
            };
        }

        match notification.metadata.severity {
            Some(Severity::Critical) | Some(Severity::Error) => emit!(error),
            Some(Severity::Warning) => emit!(warn),
            Some(Severity::Info) | None => emit!(info),
        }

        Ok(DeliveryResult::delivered(0))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::MonotonicClock;

    #[tokio::test]
    async fn test_log_provider_always_succeeds() {
        let clock = MonotonicClock::new();
        let provider = LogProvider::new();
        for severity in [Severity::Info, Severity::Warning, Severity::Critical] {
            let notification = Notification::builder("alert", "title", "message")
                .severity(severity)
                .build(&clock);
            let result = provider.send(&notification).await.unwrap();
            assert!(result.success);
        }
        assert_eq!(provider.name(), "log");
    }
}
