use std::sync::Mutex;

use jiff::Timestamp;
use tokio::time::{Duration, Instant};

/// Wall clock that never goes backwards for a single owner.
///
/// Each source owns one, so notification timestamps stay non-decreasing even
/// if the system clock is stepped back between two reads.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<Timestamp>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.observe(Timestamp::now())
    }

    fn observe(&self, reading: Timestamp) -> Timestamp {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let stamped = match *last {
            Some(previous) if previous > reading => previous,
            _ => reading,
        };
        *last = Some(stamped);
        stamped
    }
}

/// Fixed-period tick schedule anchored at a start instant.
///
/// Deadlines are `origin + k * period` for `k >= 1`. Deadlines that pass while
/// a cycle is still running are skipped rather than fired late.
#[derive(Debug, Clone)]
pub(crate) struct TickSchedule {
    origin: Instant,
    period: Duration,
    index: u64,
}

impl TickSchedule {
    pub(crate) fn new(origin: Instant, period: Duration) -> Self {
        Self {
            origin,
            period,
            index: 1,
        }
    }

    pub(crate) fn next_deadline(&self) -> Instant {
        self.deadline(self.index)
    }

    /// Moves past the deadline that just fired. The new deadline is the first
    /// one at or after `now`; returns how many deadlines were skipped.
    pub(crate) fn advance(&mut self, now: Instant) -> u64 {
        let candidate = self.index + 1;
        let period_nanos = self.period.as_nanos().max(1);
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let due = u64::try_from(elapsed.div_ceil(period_nanos)).unwrap_or(u64::MAX);
        let next = candidate.max(due);
        self.index = next;
        next - candidate
    }

    fn deadline(&self, index: u64) -> Instant {
        let offset = self.period.as_nanos().saturating_mul(u128::from(index));
        let offset = Duration::from_nanos(u64::try_from(offset).unwrap_or(u64::MAX));
        self.origin + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let later = Timestamp::from_second(2_000).unwrap();
        let earlier = Timestamp::from_second(1_000).unwrap();
        assert_eq!(clock.observe(later), later);
        assert_eq!(clock.observe(earlier), later);
        let latest = Timestamp::from_second(3_000).unwrap();
        assert_eq!(clock.observe(latest), latest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_on_time_cycles_skip_nothing() {
        let origin = Instant::now();
        let mut schedule = TickSchedule::new(origin, Duration::from_millis(500));
        assert_eq!(schedule.next_deadline(), origin + Duration::from_millis(500));

        assert_eq!(schedule.advance(origin + Duration::from_millis(500)), 0);
        assert_eq!(schedule.next_deadline(), origin + Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_skips_overdue_deadlines() {
        let origin = Instant::now();
        let mut schedule = TickSchedule::new(origin, Duration::from_millis(100));

        // Cycle fired at 100ms and finished at 350ms: 200 and 300 are dropped.
        assert_eq!(schedule.advance(origin + Duration::from_millis(350)), 2);
        assert_eq!(schedule.next_deadline(), origin + Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_deadline_at_now_is_still_due() {
        let origin = Instant::now();
        let mut schedule = TickSchedule::new(origin, Duration::from_millis(100));

        assert_eq!(schedule.advance(origin + Duration::from_millis(300)), 1);
        assert_eq!(schedule.next_deadline(), origin + Duration::from_millis(300));
    }
}
