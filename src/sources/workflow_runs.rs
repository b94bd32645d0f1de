use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use jiff::Timestamp;

use crate::config::{GithubConfig, WorkflowRunsSourceConfig};
use crate::error::{AppError, AppResult};
use crate::external::github::{GithubActionsClient, ListRunsParams, RunConclusion, WorkflowRun};
use crate::models::{EntityRef, IconRef, Link, Notification, NotificationKind, Severity};
use crate::poller::{FetchContext, MonotonicClock, PollSource};
use crate::sources::WORKFLOW_RUNS_SOURCE_ID;

/// A completed run together with the repository it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub repo: String,
    pub run: WorkflowRun,
}

/// Reports workflow runs that completed since the previous successful poll.
///
/// Runs are matched on `updated_at >= since`. A run can satisfy that on two
/// consecutive polls, so reported run ids are remembered until they fall
/// behind `since`.
pub struct WorkflowRunsSource {
    client: GithubActionsClient,
    repositories: Vec<String>,
    params: ListRunsParams,
    max_pages: u32,
    targets: BTreeMap<String, EntityRef>,
    interval: Duration,
    fetch_timeout: Option<Duration>,
    reported: Mutex<HashMap<u64, Timestamp>>,
    clock: MonotonicClock,
}

impl WorkflowRunsSource {
    pub fn new(client: GithubActionsClient, config: &WorkflowRunsSourceConfig, per_page: u32) -> AppResult<Self> {
        let targets = config
            .entity_refs
            .iter()
            .map(|(repo, target)| Ok((repo.clone(), target.parse::<EntityRef>()?)))
            .collect::<Result<BTreeMap<_, _>, AppError>>()?;

        Ok(Self {
            client,
            repositories: config.repositories.clone(),
            params: ListRunsParams {
                per_page,
                status: Some("completed".to_string()),
                branch: config.branch.clone(),
                page: None,
            },
            max_pages: config.max_pages,
            targets,
            interval: Duration::from_millis(config.interval_ms),
            fetch_timeout: config.fetch_timeout_ms.map(Duration::from_millis),
            reported: Mutex::new(HashMap::new()),
            clock: MonotonicClock::new(),
        })
    }

    pub fn from_config(github: &GithubConfig, config: &WorkflowRunsSourceConfig) -> AppResult<Self> {
        Self::new(GithubActionsClient::new(github)?, config, github.per_page)
    }

    /// Keeps runs that completed at or after `since` and were not reported
    /// yet, oldest first.
    fn select_new(&self, since: Timestamp, fetched: Vec<CompletedRun>) -> Vec<CompletedRun> {
        let mut reported = self
            .reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reported.retain(|_, updated_at| *updated_at >= since);

        let mut fresh: Vec<CompletedRun> = fetched
            .into_iter()
            .filter(|entry| entry.run.is_completed() && entry.run.updated_at >= since)
            .filter(|entry| reported.insert(entry.run.id, entry.run.updated_at).is_none())
            .collect();
        fresh.sort_by_key(|entry| (entry.run.updated_at, entry.run.id));
        fresh
    }
}

#[async_trait]
impl PollSource for WorkflowRunsSource {
    type Event = CompletedRun;

    fn id(&self) -> &str {
        WORKFLOW_RUNS_SOURCE_ID
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    async fn fetch(&self, ctx: FetchContext) -> AppResult<Vec<CompletedRun>> {
        let batches = try_join_all(self.repositories.iter().map(|repo| async move {
            let runs = self
                .client
                .list_workflow_runs_paged(repo, &self.params, self.max_pages)
                .await?;
            Ok::<_, AppError>(
                runs.into_iter()
                    .map(|run| CompletedRun {
                        repo: repo.clone(),
                        run,
                    })
                    .collect::<Vec<_>>(),
            )
        }))
        .await?;

        let fresh = self.select_new(ctx.since, batches.into_iter().flatten().collect());
        tracing::debug!(
            source_id = %ctx.source_id,
            tick = ctx.tick,
            since = %ctx.since,
            count = fresh.len(),
            "Selected completed workflow runs"
        );
        Ok(fresh)
    }

    fn normalize(&self, event: CompletedRun) -> Notification {
        let CompletedRun { repo, run } = event;
        let name = run.display_name();
        let branch = run.head_branch.as_deref().unwrap_or("unknown branch");
        let conclusion = run.conclusion.as_deref().unwrap_or("unknown");

        let (kind, severity, verb) = match run.conclusion() {
            RunConclusion::Failure => (NotificationKind::Alert, Severity::Error, "failed"),
            RunConclusion::Cancelled => (NotificationKind::Tingle, Severity::Warning, "was cancelled"),
            RunConclusion::Success => (NotificationKind::Tingle, Severity::Info, "succeeded"),
            RunConclusion::Other => (NotificationKind::Tingle, Severity::Info, "completed"),
        };

        let mut message = format!(
            "Run #{} of {} on {} finished with status: {}",
            run.run_number, name, branch, conclusion
        );
        if let Some(actor) = run.actor.as_ref() {
            message.push_str(&format!(" (triggered by {})", actor.login));
        }

        let icon = (severity >= Severity::Error).then(IconRef::error);
        Notification::builder(kind, format!("{} {} on {}", name, verb, repo), message)
            .severity(severity)
            .icon(icon)
            .link(Link::new(run.html_url.as_str(), "View run"))
            .targets(self.targets.get(&repo).cloned())
            .build(&self.clock)
    }
}
