use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::poller::clock::TickSchedule;
use crate::poller::error::{PollError, PollResult, error_chain, panic_message};
use crate::poller::sink::NotificationSink;
use crate::poller::types::{FetchContext, PollSource, PollState, SourceStatus};

/// Shared flag closed by `PollHandle::cancel`. Delivery holds the lock for a
/// whole batch, so once `cancel` returns no further sink call can start.
type DeliveryGate = Arc<Mutex<bool>>;

fn lock_gate(gate: &DeliveryGate) -> std::sync::MutexGuard<'_, bool> {
    gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum CycleOutcome {
    Completed,
    Cancelled,
}

/// Recurring fetch/normalize/deliver loop for a single source.
pub struct Poller<S: PollSource> {
    source_id: String,
    source: Arc<S>,
    sink: Arc<dyn NotificationSink>,
    cancel: CancellationToken,
    gate: DeliveryGate,
    status: watch::Sender<SourceStatus>,
    since: Timestamp,
}

impl<S: PollSource> Poller<S> {
    /// Starts polling `source` on its interval. The first fetch happens one
    /// interval from now.
    pub fn start(source: S, sink: Arc<dyn NotificationSink>) -> PollResult<PollHandle> {
        Self::start_since(source, sink, Timestamp::now())
    }

    /// Like [`start`](Self::start), with an explicit `since` for the first fetch.
    pub fn start_since(
        source: S,
        sink: Arc<dyn NotificationSink>,
        since: Timestamp,
    ) -> PollResult<PollHandle> {
        let source_id = source.id().to_string();
        let interval = source.interval();
        if interval.is_zero() {
            return Err(PollError::InvalidInterval(source_id));
        }

        let cancel = CancellationToken::new();
        let gate: DeliveryGate = Arc::new(Mutex::new(true));
        let (status_tx, status_rx) = watch::channel(SourceStatus::new(source_id.clone()));

        let poller = Poller {
            source_id: source_id.clone(),
            source: Arc::new(source),
            sink,
            cancel: cancel.clone(),
            gate: Arc::clone(&gate),
            status: status_tx,
            since,
        };

        let schedule = TickSchedule::new(Instant::now(), interval);
        tracing::info!(
            source_id = %source_id,
            interval_ms = interval.as_millis() as u64,
            "Poll source started"
        );
        let task = tokio::spawn(poller.run(schedule));

        Ok(PollHandle {
            source_id,
            cancel,
            gate,
            status: status_rx,
            task: Some(task),
        })
    }

    async fn run(mut self, mut schedule: TickSchedule) -> PollResult<()> {
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(schedule.next_deadline()) => {}
            }

            tick += 1;
            self.status.send_modify(|s| s.ticks += 1);

            match self.run_cycle(tick).await {
                Ok(CycleOutcome::Completed) => {}
                Ok(CycleOutcome::Cancelled) => break,
                Err(e) => {
                    tracing::error!(source_id = %self.source_id, tick, error = %e, "Poll source stopped");
                    self.status.send_modify(|s| {
                        s.state = PollState::Failed;
                        s.last_error = Some(e.to_string());
                    });
                    return Err(e);
                }
            }

            let skipped = schedule.advance(Instant::now());
            if skipped > 0 {
                tracing::debug!(
                    source_id = %self.source_id,
                    tick,
                    skipped,
                    "Skipped ticks that fell due while fetching"
                );
                self.status.send_modify(|s| s.skipped_ticks += skipped);
            }
        }

        self.set_state(PollState::Cancelled);
        tracing::info!(source_id = %self.source_id, ticks = tick, "Poll source cancelled");
        Ok(())
    }

    async fn run_cycle(&mut self, tick: u64) -> PollResult<CycleOutcome> {
        let started_at = Timestamp::now();
        let ctx = FetchContext {
            source_id: self.source_id.clone(),
            tick,
            since: self.since,
        };

        self.status.send_modify(|s| {
            s.state = PollState::Fetching;
            s.fetches += 1;
        });
        tracing::trace!(source_id = %self.source_id, tick, "Fetching");

        let source = Arc::clone(&self.source);
        let mut task = tokio::spawn(async move { source.fetch(ctx).await });

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                // Dropping the handle detaches the fetch; its result is never read.
                tracing::debug!(source_id = %self.source_id, tick, "Discarding in-flight fetch");
                return Ok(CycleOutcome::Cancelled);
            }
            fetched = await_fetch(&mut task, self.source.fetch_timeout()) => fetched,
        };

        let events = match fetched {
            Ok(events) => events,
            Err(cause) => {
                let err = PollError::FetchFailed {
                    source_id: self.source_id.clone(),
                    cause,
                };
                tracing::warn!(source_id = %self.source_id, tick, error = %err, "Fetch failed");
                self.status.send_modify(|s| {
                    s.state = PollState::Idle;
                    s.fetch_failures += 1;
                    s.last_error = Some(err.to_string());
                });
                return Ok(CycleOutcome::Completed);
            }
        };

        self.since = started_at;
        self.set_state(PollState::Delivering);

        let count = events.len();
        let delivered = {
            let open = lock_gate(&self.gate);
            if !*open {
                return Ok(CycleOutcome::Cancelled);
            }
            self.deliver_batch(events)?
        };

        self.status.send_modify(|s| {
            s.state = PollState::Idle;
            s.delivered += delivered;
            s.last_success = Some(started_at);
        });
        tracing::debug!(source_id = %self.source_id, tick, count, "Delivered notifications");

        Ok(CycleOutcome::Completed)
    }

    fn deliver_batch(&self, events: Vec<S::Event>) -> PollResult<u64> {
        let mut delivered = 0;
        for event in events {
            let notification = catch_unwind(AssertUnwindSafe(|| self.source.normalize(event)))
                .map_err(|payload| PollError::NormalizeFailed {
                    source_id: self.source_id.clone(),
                    message: panic_message(payload.as_ref()),
                })?;
            self.sink.deliver(notification);
            delivered += 1;
        }
        Ok(delivered)
    }

    fn set_state(&self, state: PollState) {
        self.status.send_modify(|s| s.state = state);
    }
}

async fn await_fetch<E>(
    task: &mut JoinHandle<AppResult<Vec<E>>>,
    limit: Option<Duration>,
) -> Result<Vec<E>, String> {
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut *task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(format!("fetch timed out after {}ms", limit.as_millis()));
            }
        },
        None => (&mut *task).await,
    };

    match joined {
        Ok(Ok(events)) => Ok(events),
        Ok(Err(e)) => Err(error_chain(&e)),
        Err(e) => Err(join_error_message("fetch", e)),
    }
}

fn join_error_message(task: &str, e: JoinError) -> String {
    if e.is_panic() {
        format!("{} panicked: {}", task, panic_message(e.into_panic().as_ref()))
    } else {
        format!("{} task was cancelled", task)
    }
}

/// Handle to a running source.
///
/// Cancelling is idempotent. Dropping the handle cancels the source.
#[derive(Debug)]
pub struct PollHandle {
    source_id: String,
    cancel: CancellationToken,
    gate: DeliveryGate,
    status: watch::Receiver<SourceStatus>,
    task: Option<JoinHandle<PollResult<()>>>,
}

impl PollHandle {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Stops all future ticks. A fetch already in flight may finish, but
    /// nothing it returns reaches the sink.
    pub fn cancel(&self) {
        *lock_gate(&self.gate) = false;
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self) -> SourceStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SourceStatus> {
        self.status.clone()
    }

    /// Waits for the poll task to end. Returns the `NormalizeFailed` error if
    /// the source stopped because of one.
    pub async fn join(mut self) -> PollResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(PollError::TaskAborted {
                source_id: self.source_id.clone(),
                message: join_error_message("poll", e),
            }),
        }
    }

    /// Cancels the source and waits for its task to wind down.
    pub async fn shutdown(self) -> PollResult<()> {
        self.cancel();
        self.join().await
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
