use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::Notification;

/// Context handed to every fetch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub source_id: String,
    /// 1-based tick counter for this source.
    pub tick: u64,
    /// Start of the last successful fetch, or the poller start for the first one.
    pub since: Timestamp,
}

/// An independently scheduled producer of raw events.
///
/// `fetch` may fail; `normalize` must be total. Events a source cannot
/// normalize have to be filtered out during `fetch`.
#[async_trait]
pub trait PollSource: Send + Sync + 'static {
    type Event: Send + 'static;

    /// Stable identifier used in logs and the registry
    fn id(&self) -> &str;

    fn interval(&self) -> Duration;

    /// Upper bound for a single fetch. `None` lets a hung fetch delay the
    /// source indefinitely.
    fn fetch_timeout(&self) -> Option<Duration> {
        None
    }

    async fn fetch(&self, ctx: FetchContext) -> AppResult<Vec<Self::Event>>;

    fn normalize(&self, event: Self::Event) -> Notification;
}

/// Lifecycle state of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Idle,
    Fetching,
    Delivering,
    Cancelled,
    Failed,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Cancelled | PollState::Failed)
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Idle => write!(f, "idle"),
            PollState::Fetching => write!(f, "fetching"),
            PollState::Delivering => write!(f, "delivering"),
            PollState::Cancelled => write!(f, "cancelled"),
            PollState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a source's state and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub state: PollState,
    pub ticks: u64,
    pub fetches: u64,
    pub skipped_ticks: u64,
    pub fetch_failures: u64,
    pub delivered: u64,
    pub last_error: Option<String>,
    pub last_success: Option<Timestamp>,
}

impl SourceStatus {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            state: PollState::Idle,
            ticks: 0,
            fetches: 0,
            skipped_ticks: 0,
            fetch_failures: 0,
            delivered: 0,
            last_error: None,
            last_success: None,
        }
    }
}

/// Runs one fetch + normalize cycle outside any schedule.
pub async fn poll_once<S: PollSource>(source: &S, since: Timestamp) -> AppResult<Vec<Notification>> {
    let ctx = FetchContext {
        source_id: source.id().to_string(),
        tick: 1,
        since,
    };
    let events = source.fetch(ctx).await?;
    Ok(events.into_iter().map(|event| source.normalize(event)).collect())
}
