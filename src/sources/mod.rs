//! Built-in poll sources and their wiring from settings.

mod sample_alerts;
mod user_alerts;
mod workflow_runs;

pub use sample_alerts::{SampleAlert, SampleAlertSource};
pub use user_alerts::{UserAlert, UserAlertSource};
pub use workflow_runs::{CompletedRun, WorkflowRunsSource};

use std::time::Duration;

use jiff::Timestamp;
use serde::Serialize;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::models::Notification;
use crate::poller::{SourceRegistry, poll_once};

pub const ALERTS_SOURCE_ID: &str = "github-actions-notification-source";
pub const USER_ALERTS_SOURCE_ID: &str = "github-actions-user-notification-source";
pub const WORKFLOW_RUNS_SOURCE_ID: &str = "github-actions-workflow-runs";

/// Static view of a configured source, for listings and dry runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    pub id: &'static str,
    pub enabled: bool,
    #[serde(with = "millis")]
    pub interval: Duration,
    pub description: String,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

/// Every built-in source in registration order, enabled or not.
pub fn describe(settings: &Settings) -> Vec<SourceDescriptor> {
    let sources = &settings.sources;
    vec![
        SourceDescriptor {
            id: ALERTS_SOURCE_ID,
            enabled: sources.alerts.enabled,
            interval: Duration::from_millis(sources.alerts.interval_ms),
            description: "placeholder alert channel".to_string(),
        },
        SourceDescriptor {
            id: USER_ALERTS_SOURCE_ID,
            enabled: sources.user_alerts.enabled,
            interval: Duration::from_millis(sources.user_alerts.interval_ms),
            description: format!(
                "placeholder build failures for {}",
                sources.user_alerts.target_entity_refs.join(", ")
            ),
        },
        SourceDescriptor {
            id: WORKFLOW_RUNS_SOURCE_ID,
            enabled: sources.workflow_runs.enabled,
            interval: Duration::from_millis(sources.workflow_runs.interval_ms),
            description: if sources.workflow_runs.repositories.is_empty() {
                "completed workflow runs (no repositories)".to_string()
            } else {
                format!(
                    "completed workflow runs of {}",
                    sources.workflow_runs.repositories.join(", ")
                )
            },
        },
    ]
}

/// Starts a poller for every enabled source. Returns how many were started.
pub fn register_enabled(settings: &Settings, registry: &SourceRegistry) -> AppResult<usize> {
    let sources = &settings.sources;
    let mut started = 0;

    if sources.alerts.enabled {
        registry.register(SampleAlertSource::from_config(&sources.alerts))?;
        started += 1;
    }
    if sources.user_alerts.enabled {
        registry.register(UserAlertSource::from_config(&sources.user_alerts)?)?;
        started += 1;
    }
    if sources.workflow_runs.enabled {
        registry.register(WorkflowRunsSource::from_config(
            &settings.github,
            &sources.workflow_runs,
        )?)?;
        started += 1;
    }

    tracing::info!(count = started, "Registered poll sources");
    Ok(started)
}

/// Runs a single fetch and normalize for `source_id`, ignoring whether the
/// source is enabled. `since` bounds what the source considers new.
pub async fn poll_source_once(
    settings: &Settings,
    source_id: &str,
    since: Timestamp,
) -> AppResult<Vec<Notification>> {
    let sources = &settings.sources;
    match source_id {
        ALERTS_SOURCE_ID => poll_once(&SampleAlertSource::from_config(&sources.alerts), since).await,
        USER_ALERTS_SOURCE_ID => {
            poll_once(&UserAlertSource::from_config(&sources.user_alerts)?, since).await
        }
        WORKFLOW_RUNS_SOURCE_ID => {
            let source = WorkflowRunsSource::from_config(&settings.github, &sources.workflow_runs)?;
            poll_once(&source, since).await
        }
        other => Err(AppError::NotFound {
            entity: "source".to_string(),
            field: "id".to_string(),
            value: other.to_string(),
        }),
    }
}
