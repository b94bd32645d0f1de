use std::time::Duration;

use async_trait::async_trait;

use crate::config::UserAlertSourceConfig;
use crate::error::{AppError, AppResult};
use crate::models::{EntityRef, IconRef, Link, Notification, NotificationKind};
use crate::poller::{FetchContext, MonotonicClock, PollSource};
use crate::sources::USER_ALERTS_SOURCE_ID;

const TITLE: &str = "Build failed";
const MESSAGE: &str =
    "The queued build on component sample-component-name has failed with status: Error 500";

/// Raw event of the placeholder user channel. The icon is decided at fetch
/// time so that normalizing stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAlert {
    pub title: String,
    pub message: String,
    pub with_icon: bool,
}

/// Placeholder channel posting one targeted build failure per tick.
#[derive(Debug)]
pub struct UserAlertSource {
    interval: Duration,
    fetch_timeout: Option<Duration>,
    targets: Vec<EntityRef>,
    icon_probability: f64,
    alert_url: String,
    entity_url: String,
    clock: MonotonicClock,
}

impl UserAlertSource {
    pub fn from_config(config: &UserAlertSourceConfig) -> AppResult<Self> {
        let targets = config
            .target_entity_refs
            .iter()
            .map(|target| target.parse::<EntityRef>())
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Self {
            interval: Duration::from_millis(config.interval_ms),
            fetch_timeout: config.fetch_timeout_ms.map(Duration::from_millis),
            targets,
            icon_probability: config.icon_probability.clamp(0.0, 1.0),
            alert_url: config.alert_url.clone(),
            entity_url: config.entity_url.clone(),
            clock: MonotonicClock::new(),
        })
    }
}

#[async_trait]
impl PollSource for UserAlertSource {
    type Event = UserAlert;

    fn id(&self) -> &str {
        USER_ALERTS_SOURCE_ID
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    async fn fetch(&self, _ctx: FetchContext) -> AppResult<Vec<UserAlert>> {
        Ok(vec![UserAlert {
            title: TITLE.to_string(),
            message: MESSAGE.to_string(),
            with_icon: rand::random_bool(self.icon_probability),
        }])
    }

    fn normalize(&self, event: UserAlert) -> Notification {
        Notification::builder(NotificationKind::Tingle, event.title, event.message)
            .icon(event.with_icon.then(IconRef::error))
            .link(Link::new(self.alert_url.as_str(), "View alert"))
            .link(Link::new(self.entity_url.as_str(), "Go to entity"))
            .targets(self.targets.iter().cloned())
            .build(&self.clock)
    }
}
