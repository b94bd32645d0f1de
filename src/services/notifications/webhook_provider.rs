//! Webhook notification provider implementation.
//!
//! POSTs the notification JSON to a configured URL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::provider::{DeliveryResult, NotificationProvider};
use crate::config::WebhookDeliveryConfig;
use crate::error::{AppError, AppResult};
use crate::external::client::build_http_client;
use crate::models::Notification;

pub struct WebhookProvider {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
}

impl WebhookProvider {
    pub fn new(config: &WebhookDeliveryConfig) -> AppResult<Self> {
        let url = Url::parse(&config.url).map_err(|e| AppError::Validation {
            field: "delivery.webhook.url".to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| AppError::Validation {
                field: "delivery.webhook.headers".to_string(),
                reason: format!("Invalid header name: {}", key),
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| AppError::Validation {
                field: "delivery.webhook.headers".to_string(),
                reason: format!("Invalid value for header {}", key),
            })?;
            headers.insert(name, value);
        }

        Ok(Self {
            client: build_http_client(Duration::from_secs(config.timeout_secs))?,
            url,
            headers,
        })
    }
}

#[async_trait]
impl NotificationProvider for WebhookProvider {
    /// A transport error or non-2xx response yields `success: false` with
    /// the error or response body recorded.
    async fn send(&self, notification: &Notification) -> AppResult<DeliveryResult> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .json(notification)
            .send()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(resp) => {
                let status = resp.status();
                Ok(DeliveryResult {
                    success: status.is_success(),
                    status_code: Some(status.as_u16()),
                    response: resp.text().await.ok().filter(|body| !body.is_empty()),
                    duration_ms,
                })
            }
            Err(e) => Ok(DeliveryResult {
                success: false,
                status_code: None,
                response: Some(e.to_string()),
                duration_ms,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
