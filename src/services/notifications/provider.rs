//! Core notification provider trait and types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::Notification;

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    /// HTTP status code or provider-specific status
    pub status_code: Option<u16>,
    /// Response body or error message
    pub response: Option<String>,
    pub duration_ms: u64,
}

impl DeliveryResult {
    pub fn delivered(duration_ms: u64) -> Self {
        Self {
            success: true,
            status_code: None,
            response: None,
            duration_ms,
        }
    }
}

/// A downstream channel notifications are delivered to.
///
/// `Err` means the provider could not even attempt delivery; a rejected
/// attempt is an `Ok` result with `success: false`.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send(&self, notification: &Notification) -> AppResult<DeliveryResult>;

    /// Provider name for logs (e.g. "log", "webhook")
    fn name(&self) -> &'static str;
}
