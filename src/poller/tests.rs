//! Scheduling, delivery and cancellation tests for the poller.
//!
//! All timing tests run on a paused Tokio clock, so sleeps resolve in
//! virtual time and tick boundaries are exact.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationKind};
use crate::poller::{
    FetchContext, MonotonicClock, NotificationSink, PollError, PollSource, PollState, Poller,
    SourceRegistry,
};

#[derive(Debug, Clone)]
enum Step {
    Batch(Vec<&'static str>),
    Fail(&'static str),
    Panic,
}

#[derive(Default)]
struct Probe {
    fetch_calls: AtomicUsize,
    fetch_completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    since_seen: Mutex<Vec<Timestamp>>,
}

struct ScriptedSource {
    id: String,
    interval: Duration,
    delay: Duration,
    timeout: Option<Duration>,
    script: Mutex<VecDeque<Step>>,
    probe: Arc<Probe>,
    clock: MonotonicClock,
}

impl ScriptedSource {
    fn new(id: &str, interval_ms: u64, script: Vec<Step>) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let source = Self {
            id: id.to_string(),
            interval: Duration::from_millis(interval_ms),
            delay: Duration::ZERO,
            timeout: None,
            script: Mutex::new(script.into()),
            probe: Arc::clone(&probe),
            clock: MonotonicClock::new(),
        };
        (source, probe)
    }

    fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(timeout_ms));
        self
    }
}

#[async_trait]
impl PollSource for ScriptedSource {
    type Event = String;

    fn id(&self) -> &str {
        &self.id
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn fetch_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn fetch(&self, ctx: FetchContext) -> AppResult<Vec<String>> {
        self.probe.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.since_seen.lock().unwrap().push(ctx.since);
        let now_in_flight = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.probe.fetch_completed.fetch_add(1, Ordering::SeqCst);

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Batch(items)) => Ok(items.into_iter().map(String::from).collect()),
            Some(Step::Fail(reason)) => Err(AppError::ExternalApi {
                service: "scripted".to_string(),
                message: reason.to_string(),
                source: None,
            }),
            Some(Step::Panic) => panic!("fetch exploded"),
            None => Ok(Vec::new()),
        }
    }

    fn normalize(&self, event: String) -> Notification {
        if event == "boom" {
            panic!("cannot normalize {event}");
        }
        Notification::builder(NotificationKind::Alert, event.clone(), format!("event {event}"))
            .build(&self.clock)
    }
}

type Received = Arc<Mutex<Vec<Notification>>>;

fn collecting_sink() -> (Arc<dyn NotificationSink>, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::clone(&received);
    let sink = move |notification: Notification| store.lock().unwrap().push(notification);
    (Arc::new(sink), received)
}

fn titles(received: &Received) -> Vec<String> {
    received
        .lock()
        .unwrap()
        .iter()
        .map(|n| n.metadata.title.clone())
        .collect()
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_waits_one_interval() {
    let (source, probe) = ScriptedSource::new("s", 1000, vec![Step::Batch(vec!["a", "b"])]);
    let (sink, received) = collecting_sink();
    let _handle = Poller::start(source, sink).unwrap();

    sleep_ms(999).await;
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 0);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_source_scenario() {
    let (source, probe) = ScriptedSource::new("s", 1000, vec![Step::Batch(vec!["a", "b"])]);
    let (sink, received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(1001).await;
    assert_eq!(titles(&received), vec!["a", "b"]);

    sleep_ms(1000).await;
    assert_eq!(titles(&received), vec!["a", "b"]);
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 2);

    let status = handle.status();
    assert_eq!(status.ticks, 2);
    assert_eq!(status.delivered, 2);
    assert_eq!(status.state, PollState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_two_sources_fire_on_their_own_intervals() {
    let (fast, fast_probe) = ScriptedSource::new("fast", 500, vec![]);
    let (slow, slow_probe) = ScriptedSource::new("slow", 1000, vec![]);
    let (sink, _received) = collecting_sink();

    let _fast = Poller::start(fast, Arc::clone(&sink)).unwrap();
    let _slow = Poller::start(slow, sink).unwrap();

    sleep_ms(2100).await;
    assert_eq!(fast_probe.fetch_calls.load(Ordering::SeqCst), 4);
    assert_eq!(slow_probe.fetch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_skips_overdue_ticks() {
    let (source, probe) = ScriptedSource::new("slow-fetch", 100, vec![]);
    let source = source.with_delay(250);
    let (sink, _received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(1001).await;

    // Fetches start at 100, 400, 700 and 1000; everything in between is dropped.
    let calls = probe.fetch_calls.load(Ordering::SeqCst);
    assert_eq!(calls, 4);
    assert!(calls <= 1001 / 100);
    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().skipped_ticks, 6);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_in_flight_fetch() {
    let (source, probe) = ScriptedSource::new("s", 100, vec![Step::Batch(vec!["late"])]);
    let source = source.with_delay(500);
    let (sink, received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(150).await;
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 1);
    handle.cancel();

    sleep_ms(1000).await;
    // The fetch ran to completion in the background, but nothing was delivered.
    assert_eq!(probe.fetch_completed.load(Ordering::SeqCst), 1);
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 1);
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(handle.status().state, PollState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let (source, probe) = ScriptedSource::new("s", 100, vec![]);
    let (sink, _received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(250).await;
    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());

    sleep_ms(500).await;
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 2);
    assert!(handle.join().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_cancels_source() {
    let (source, probe) = ScriptedSource::new("s", 100, vec![]);
    let (sink, _received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(150).await;
    drop(handle);
    sleep_ms(500).await;
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_does_not_stop_schedule() {
    let (flaky, flaky_probe) = ScriptedSource::new(
        "flaky",
        500,
        vec![Step::Fail("connection reset"), Step::Batch(vec!["recovered"])],
    );
    let (steady, _steady_probe) =
        ScriptedSource::new("steady", 500, vec![Step::Batch(vec!["steady"])]);
    let (sink, received) = collecting_sink();

    let flaky_handle = Poller::start(flaky, Arc::clone(&sink)).unwrap();
    let _steady_handle = Poller::start(steady, sink).unwrap();

    sleep_ms(501).await;
    assert_eq!(titles(&received), vec!["steady"]);
    let status = flaky_handle.status();
    assert_eq!(status.fetch_failures, 1);
    assert!(status.last_error.unwrap().contains("connection reset"));

    sleep_ms(500).await;
    assert_eq!(flaky_probe.fetch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(titles(&received), vec!["steady", "recovered"]);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_panic_is_reported_as_fetch_failure() {
    let (source, probe) =
        ScriptedSource::new("s", 100, vec![Step::Panic, Step::Batch(vec!["after"])]);
    let (sink, received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(201).await;
    assert_eq!(probe.fetch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(titles(&received), vec!["after"]);
    let status = handle.status();
    assert_eq!(status.fetch_failures, 1);
    assert!(status.last_error.unwrap().contains("fetch exploded"));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_counts_as_failure() {
    let (source, _probe) = ScriptedSource::new("s", 100, vec![Step::Batch(vec!["too-late"])]);
    let source = source.with_delay(300).with_timeout(50);
    let (sink, received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(151).await;
    let status = handle.status();
    assert_eq!(status.fetch_failures, 1);
    assert!(status.last_error.unwrap().contains("timed out"));
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_normalize_panic_is_surfaced() {
    let (source, _probe) =
        ScriptedSource::new("s", 100, vec![Step::Batch(vec!["ok", "boom", "never"])]);
    let (sink, received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();

    sleep_ms(101).await;
    assert_eq!(titles(&received), vec!["ok"]);
    assert_eq!(handle.status().state, PollState::Failed);

    match handle.join().await {
        Err(PollError::NormalizeFailed { source_id, message }) => {
            assert_eq!(source_id, "s");
            assert!(message.contains("boom"));
        }
        other => panic!("expected NormalizeFailed, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_since_advances_after_successful_fetch() {
    let (source, probe) = ScriptedSource::new("s", 100, vec![Step::Batch(vec![])]);
    let (sink, _received) = collecting_sink();
    let _handle = Poller::start_since(source, sink, Timestamp::UNIX_EPOCH).unwrap();

    sleep_ms(201).await;
    let seen = probe.since_seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], Timestamp::UNIX_EPOCH);
    assert!(seen[1] > Timestamp::UNIX_EPOCH);
}

#[tokio::test(start_paused = true)]
async fn test_batch_ids_unique_and_timestamps_ordered() {
    let (source, _probe) =
        ScriptedSource::new("s", 100, vec![Step::Batch(vec!["a", "b", "c", "d"])]);
    let (sink, received) = collecting_sink();
    let _handle = Poller::start(source, sink).unwrap();

    sleep_ms(101).await;
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 4);
    for pair in received.windows(2) {
        assert_ne!(pair[0].id(), pair[1].id());
        assert!(pair[0].timestamp() <= pair[1].timestamp());
    }
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let (source, _probe) = ScriptedSource::new("zero", 0, vec![]);
    let (sink, _received) = collecting_sink();
    assert!(matches!(
        Poller::start(source, sink),
        Err(PollError::InvalidInterval(id)) if id == "zero"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_registry_lifecycle() {
    let (sink, received) = collecting_sink();
    let registry = SourceRegistry::new(sink);

    let (a, _) = ScriptedSource::new("b-source", 100, vec![Step::Batch(vec!["from-b"])]);
    let (b, _) = ScriptedSource::new("a-source", 100, vec![Step::Batch(vec!["from-a"])]);
    registry.register(a).unwrap();
    registry.register(b).unwrap();
    assert_eq!(registry.len(), 2);

    let (duplicate, _) = ScriptedSource::new("a-source", 100, vec![]);
    assert!(matches!(
        registry.register(duplicate),
        Err(PollError::AlreadyRegistered(id)) if id == "a-source"
    ));
    assert!(matches!(registry.cancel("missing"), Err(PollError::NotFound(_))));

    sleep_ms(101).await;
    let mut got = titles(&received);
    got.sort();
    assert_eq!(got, vec!["from-a", "from-b"]);

    let ids: Vec<_> = registry.statuses().into_iter().map(|s| s.source_id).collect();
    assert_eq!(ids, vec!["a-source", "b-source"]);

    registry.cancel("a-source").unwrap();
    sleep_ms(1).await;
    assert_eq!(registry.status("a-source").unwrap().state, PollState::Cancelled);

    let results = registry.shutdown().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, result)| result.is_ok()));
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_observes_terminal_state() {
    let (source, _probe) = ScriptedSource::new("s", 100, vec![Step::Batch(vec!["one"])]);
    let (sink, received) = collecting_sink();
    let handle = Poller::start(source, sink).unwrap();
    let mut updates = handle.subscribe();

    sleep_ms(150).await;
    assert_eq!(titles(&received), vec!["one"]);
    assert!(!handle.status().state.is_terminal());

    handle.cancel();
    let status = updates
        .wait_for(|status| status.state.is_terminal())
        .await
        .unwrap()
        .clone();
    assert_eq!(status.state, PollState::Cancelled);
    assert_eq!(status.ticks, 1);
}

#[test]
fn test_terminal_states() {
    assert!(PollState::Cancelled.is_terminal());
    assert!(PollState::Failed.is_terminal());
    assert!(!PollState::Idle.is_terminal());
    assert!(!PollState::Fetching.is_terminal());
    assert!(!PollState::Delivering.is_terminal());
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    const WORDS: &[&str] = &["a", "b", "c", "d", "e", "f", "g"];

    fn batches() -> impl Strategy<Value = Vec<Vec<&'static str>>> {
        prop::collection::vec(
            prop::collection::vec(prop::sample::select(WORDS), 0..5),
            1..6,
        )
    }

    proptest! {
        #[test]
        fn property_every_event_delivered_in_order(batches in batches()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();

            let expected: Vec<String> = batches.iter().flatten().map(|s| s.to_string()).collect();
            let rounds = batches.len() as u64;
            let script: Vec<Step> = batches.into_iter().map(Step::Batch).collect();

            let delivered = runtime.block_on(async move {
                let (source, _probe) = ScriptedSource::new("prop", 100, script);
                let (sink, received) = collecting_sink();
                let handle = Poller::start(source, sink).unwrap();
                sleep_ms(rounds * 100 + 1).await;
                handle.cancel();
                titles(&received)
            });

            prop_assert_eq!(delivered, expected);
        }
    }
}
