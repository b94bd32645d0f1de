//! Notification delivery with pluggable providers.
//!
//! Pollers hand notifications to a [`ChannelSink`](crate::poller::ChannelSink);
//! the [`NotificationService`] drains that channel and fans every
//! notification out to each configured [`NotificationProvider`].

mod log_provider;
mod provider;
mod webhook_provider;

pub mod notification_service;

pub use log_provider::LogProvider;
pub use notification_service::{DispatchStats, NotificationService};
pub use provider::{DeliveryResult, NotificationProvider};
pub use webhook_provider::WebhookProvider;
