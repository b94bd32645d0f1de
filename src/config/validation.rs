//! Configuration validation logic
//!
//! Each section validates itself and reports the first offending field as a
//! dotted key, matching the TOML layout.

use crate::config::error::ConfigError;
use crate::config::settings::{
    AlertSourceConfig, DeliveryConfig, GithubConfig, LoggerSettings, Settings, SourcesConfig,
    UserAlertSourceConfig, WorkflowRunsSourceConfig,
};
use crate::models::EntityRef;

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

fn validate_interval(field: &str, interval_ms: u64) -> Result<(), ConfigError> {
    if interval_ms == 0 {
        return Err(ConfigError::validation(
            field,
            "Interval must be greater than 0 milliseconds.",
        ));
    }
    Ok(())
}

fn validate_fetch_timeout(field: &str, timeout_ms: Option<u64>) -> Result<(), ConfigError> {
    if timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            field,
            "Fetch timeout must be greater than 0 milliseconds when set.",
        ));
    }
    Ok(())
}

fn validate_entity_ref(field: &str, value: &str) -> Result<(), ConfigError> {
    value
        .parse::<EntityRef>()
        .map(|_| ())
        .map_err(|e| ConfigError::validation(field, e.to_string()))
}

fn validate_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: field.to_string(),
            message: format!("Invalid URL '{}'. Expected an http:// or https:// URL.", url),
        });
    }
    Ok(())
}

/// `owner/repo` with both parts non-empty.
pub(crate) fn is_valid_repository(repo: &str) -> bool {
    match repo.split_once('/') {
        Some((owner, name)) => {
            !owner.is_empty() && !name.is_empty() && !name.contains('/') && !repo.contains(char::is_whitespace)
        }
        None => false,
    }
}

impl LoggerSettings {
    /// Checks the level and formats; the full logger check runs when the
    /// settings are turned into a `LoggerConfig`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, format) in [
            ("logger.console.format", &self.console.format),
            ("logger.file.format", &self.file.format),
        ] {
            if !VALID_LOG_FORMATS.contains(&format.to_lowercase().as_str()) {
                return Err(ConfigError::ValidationError {
                    field: field.to_string(),
                    message: format!(
                        "Invalid log format '{}'. Valid formats are: {}",
                        format,
                        VALID_LOG_FORMATS.join(", ")
                    ),
                });
            }
        }

        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        self.clone().into_logger_config().map(|_| ())
    }
}

impl GithubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("github.api_url", &self.api_url)?;

        if !(1..=100).contains(&self.per_page) {
            return Err(ConfigError::validation(
                "github.per_page",
                "per_page must be between 1 and 100.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "github.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        if matches!(&self.token, Some(token) if token.trim().is_empty()) {
            return Err(ConfigError::validation(
                "github.token",
                "Token must not be blank; remove the key for anonymous access.",
            ));
        }

        Ok(())
    }
}

impl AlertSourceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_interval("sources.alerts.interval_ms", self.interval_ms)?;
        validate_fetch_timeout("sources.alerts.fetch_timeout_ms", self.fetch_timeout_ms)
    }
}

impl UserAlertSourceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_interval("sources.user_alerts.interval_ms", self.interval_ms)?;
        validate_fetch_timeout("sources.user_alerts.fetch_timeout_ms", self.fetch_timeout_ms)?;

        for target in &self.target_entity_refs {
            validate_entity_ref("sources.user_alerts.target_entity_refs", target)?;
        }

        if !(0.0..=1.0).contains(&self.icon_probability) {
            return Err(ConfigError::ValidationError {
                field: "sources.user_alerts.icon_probability".to_string(),
                message: format!(
                    "Probability must be between 0 and 1, got {}.",
                    self.icon_probability
                ),
            });
        }

        Ok(())
    }
}

impl WorkflowRunsSourceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_interval("sources.workflow_runs.interval_ms", self.interval_ms)?;
        validate_fetch_timeout("sources.workflow_runs.fetch_timeout_ms", self.fetch_timeout_ms)?;

        if self.max_pages == 0 {
            return Err(ConfigError::validation(
                "sources.workflow_runs.max_pages",
                "max_pages must be at least 1.",
            ));
        }

        if self.enabled && self.repositories.is_empty() {
            return Err(ConfigError::validation(
                "sources.workflow_runs.repositories",
                "At least one repository is required when the workflow runs source is enabled.",
            ));
        }

        for repo in self.repositories.iter().chain(self.entity_refs.keys()) {
            if !is_valid_repository(repo) {
                return Err(ConfigError::ValidationError {
                    field: "sources.workflow_runs.repositories".to_string(),
                    message: format!("Invalid repository '{}'. Expected owner/repo.", repo),
                });
            }
        }

        for entity_ref in self.entity_refs.values() {
            validate_entity_ref("sources.workflow_runs.entity_refs", entity_ref)?;
        }

        Ok(())
    }
}

impl SourcesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alerts.validate()?;
        self.user_alerts.validate()?;
        self.workflow_runs.validate()
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let webhook = &self.webhook;
        if webhook.enabled {
            if webhook.url.trim().is_empty() {
                return Err(ConfigError::validation(
                    "delivery.webhook.url",
                    "Webhook URL is required when webhook delivery is enabled.",
                ));
            }
            validate_http_url("delivery.webhook.url", &webhook.url)?;
            if webhook.timeout_secs == 0 {
                return Err(ConfigError::validation(
                    "delivery.webhook.timeout_secs",
                    "Webhook timeout must be greater than 0 seconds.",
                ));
            }
        }
        Ok(())
    }
}

impl Settings {
    /// Validate all sections, returning the first error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logger.validate()?;
        self.github.validate()?;
        self.sources.validate()?;
        self.delivery.validate()?;
        Ok(())
    }
}
