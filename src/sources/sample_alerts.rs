use std::time::Duration;

use async_trait::async_trait;

use crate::config::AlertSourceConfig;
use crate::error::AppResult;
use crate::models::{Notification, NotificationKind, Severity};
use crate::poller::{FetchContext, MonotonicClock, PollSource};
use crate::sources::ALERTS_SOURCE_ID;

/// Raw event of the placeholder alert channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleAlert {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Default for SampleAlert {
    fn default() -> Self {
        Self {
            title: "sample title".to_string(),
            message: "sample notification".to_string(),
            severity: Severity::Warning,
        }
    }
}

/// Placeholder channel posting one global warning alert per tick.
#[derive(Debug)]
pub struct SampleAlertSource {
    interval: Duration,
    fetch_timeout: Option<Duration>,
    clock: MonotonicClock,
}

impl SampleAlertSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            fetch_timeout: None,
            clock: MonotonicClock::new(),
        }
    }

    pub fn from_config(config: &AlertSourceConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout_ms.map(Duration::from_millis),
            ..Self::new(Duration::from_millis(config.interval_ms))
        }
    }
}

#[async_trait]
impl PollSource for SampleAlertSource {
    type Event = SampleAlert;

    fn id(&self) -> &str {
        ALERTS_SOURCE_ID
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    async fn fetch(&self, _ctx: FetchContext) -> AppResult<Vec<SampleAlert>> {
        Ok(vec![SampleAlert::default()])
    }

    fn normalize(&self, event: SampleAlert) -> Notification {
        Notification::builder(NotificationKind::Alert, event.title, event.message)
            .severity(event.severity)
            .build(&self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::poll_once;
    use jiff::Timestamp;

    #[tokio::test]
    async fn test_emits_one_global_warning() {
        let source = SampleAlertSource::from_config(&AlertSourceConfig::default());
        assert_eq!(source.interval(), Duration::from_secs(30));

        let notifications = poll_once(&source, Timestamp::now()).await.unwrap();
        assert_eq!(notifications.len(), 1);

        let alert = &notifications[0];
        assert_eq!(alert.kind, NotificationKind::Alert);
        assert_eq!(alert.metadata.title, "sample title");
        assert_eq!(alert.metadata.message, "sample notification");
        assert_eq!(alert.metadata.severity, Some(Severity::Warning));
        assert!(alert.spec.is_none());
        assert!(alert.is_global());
    }
}
