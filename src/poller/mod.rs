//! Recurring poll-and-normalize engine.
//!
//! Each [`PollSource`] runs on its own task: on every tick it fetches a batch
//! of raw events, normalizes them into [`Notification`](crate::models::Notification)s
//! and hands them to a [`NotificationSink`]. At most one fetch per source is
//! in flight; ticks that fall due meanwhile are skipped.

pub mod clock;
pub mod error;
pub mod registry;
pub mod runner;
pub mod sink;
pub mod types;

#[cfg(test)]
mod tests;

pub use clock::MonotonicClock;
pub use error::{PollError, PollResult};
pub use registry::SourceRegistry;
pub use runner::{PollHandle, Poller};
pub use sink::{ChannelSink, NotificationSink};
pub use types::{FetchContext, PollSource, PollState, SourceStatus, poll_once};
