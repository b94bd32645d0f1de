//! Configuration settings structures for runwatch
//!
//! Every section deserializes with defaults, so a `default.toml` only needs
//! the keys it wants to change.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "runwatch".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_console_format() -> String {
    "full".to_string()
}

fn default_log_path() -> String {
    "logs/runwatch.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_files() -> usize {
    5
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    20
}

fn default_github_timeout() -> u64 {
    30
}

fn default_alerts_interval() -> u64 {
    30_000
}

fn default_user_alerts_interval() -> u64 {
    10_000
}

fn default_workflow_runs_max_pages() -> u32 {
    5
}

fn default_workflow_runs_interval() -> u64 {
    60_000
}

fn default_user_targets() -> Vec<String> {
    vec!["user:default/guest".to_string()]
}

fn default_icon_probability() -> f64 {
    0.5
}

fn default_webhook_timeout() -> u64 {
    10
}

// ============================================================================
// Application Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Colors are only emitted when stdout is a terminal
    #[serde(default = "default_true")]
    pub colored: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_console_format")]
    pub format: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
            format: default_console_format(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Maximum file size in bytes before rotation
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Maximum number of rotated files to keep
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
            max_size: default_max_size(),
            max_files: default_max_files(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// A level name or an `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime `LoggerConfig`.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let config = LoggerConfig {
            console: ConsoleConfig {
                enabled: self.console.enabled,
                colored: self.console.colored,
                format: parse_format("logger.console.format", &self.console.format)?,
            },
            file: FileConfig {
                enabled: self.file.enabled,
                path: PathBuf::from(self.file.path),
                append: self.file.append,
                format: parse_format("logger.file.format", &self.file.format)?,
                max_size: self.file.max_size,
                max_files: self.file.max_files,
            },
            level: self.level,
        };

        config
            .validate()
            .map_err(|e| ConfigError::validation("logger", format!("{:#}", e)))?;
        Ok(config)
    }
}

fn parse_format(field: &str, value: &str) -> Result<LogFormat, ConfigError> {
    value
        .parse::<LogFormat>()
        .map_err(|e| ConfigError::validation(field, e.to_string()))
}

// ============================================================================
// GitHub Configuration
// ============================================================================

/// GitHub REST API access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Personal access token or app token; anonymous requests when unset
    #[serde(default)]
    pub token: Option<String>,

    /// Runs requested per repository and poll
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Request timeout in seconds
    #[serde(default = "default_github_timeout")]
    pub request_timeout: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            per_page: default_per_page(),
            request_timeout: default_github_timeout(),
        }
    }
}

impl GithubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

// ============================================================================
// Source Configuration
// ============================================================================

/// `github-actions-notification-source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_alerts_interval")]
    pub interval_ms: u64,

    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for AlertSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_alerts_interval(),
            fetch_timeout_ms: None,
        }
    }
}

/// `github-actions-user-notification-source`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAlertSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_user_alerts_interval")]
    pub interval_ms: u64,

    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    #[serde(default = "default_user_targets")]
    pub target_entity_refs: Vec<String>,

    /// Chance that a notification carries the error icon
    #[serde(default = "default_icon_probability")]
    pub icon_probability: f64,

    #[serde(default)]
    pub alert_url: String,

    #[serde(default)]
    pub entity_url: String,
}

impl Default for UserAlertSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_user_alerts_interval(),
            fetch_timeout_ms: None,
            target_entity_refs: default_user_targets(),
            icon_probability: default_icon_probability(),
            alert_url: String::new(),
            entity_url: String::new(),
        }
    }
}

/// `github-actions-workflow-runs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunsSourceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_workflow_runs_interval")]
    pub interval_ms: u64,

    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    /// Repositories to watch, as `owner/repo`
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Only report runs on this branch
    #[serde(default)]
    pub branch: Option<String>,

    /// Entity ref notified for each repository; repositories without an
    /// entry produce global notifications
    #[serde(default)]
    pub entity_refs: BTreeMap<String, String>,

    /// Upper bound on result pages read per repository and poll
    #[serde(default = "default_workflow_runs_max_pages")]
    pub max_pages: u32,
}

impl Default for WorkflowRunsSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_workflow_runs_interval(),
            fetch_timeout_ms: None,
            repositories: Vec::new(),
            branch: None,
            entity_refs: BTreeMap::new(),
            max_pages: default_workflow_runs_max_pages(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub alerts: AlertSourceConfig,

    #[serde(default)]
    pub user_alerts: UserAlertSourceConfig,

    #[serde(default)]
    pub workflow_runs: WorkflowRunsSourceConfig,
}

// ============================================================================
// Delivery Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDeliveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LogDeliveryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDeliveryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for WebhookDeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_secs: default_webhook_timeout(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub log: LogDeliveryConfig,

    #[serde(default)]
    pub webhook: WebhookDeliveryConfig,
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings, as loaded from TOML layers and
/// `RUNWATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults() {
        let sources = SourcesConfig::default();
        assert!(sources.alerts.enabled);
        assert_eq!(sources.alerts.interval_ms, 30_000);
        assert!(sources.user_alerts.enabled);
        assert_eq!(sources.user_alerts.interval_ms, 10_000);
        assert_eq!(sources.user_alerts.target_entity_refs, vec!["user:default/guest"]);
        assert_eq!(sources.user_alerts.icon_probability, 0.5);
        assert!(!sources.workflow_runs.enabled);
        assert_eq!(sources.workflow_runs.interval_ms, 60_000);
    }

    #[test]
    fn test_github_defaults() {
        let github = GithubConfig::default();
        assert_eq!(github.api_url, "https://api.github.com");
        assert_eq!(github.per_page, 20);
        assert!(github.token.is_none());
        assert_eq!(github.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let toml = r#"
[sources.alerts]
interval_ms = 5000

[sources.workflow_runs]
enabled = true
repositories = ["acme/widgets"]

[sources.workflow_runs.entity_refs]
"acme/widgets" = "component:default/widgets"

[delivery.webhook]
enabled = true
url = "http://localhost:9000/hook"

[delivery.webhook.headers]
x-token = "secret"
"#;
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.sources.alerts.interval_ms, 5000);
        assert!(settings.sources.alerts.enabled);
        assert_eq!(settings.sources.workflow_runs.repositories, vec!["acme/widgets"]);
        assert_eq!(
            settings.sources.workflow_runs.entity_refs.get("acme/widgets").map(String::as_str),
            Some("component:default/widgets")
        );
        assert_eq!(settings.delivery.webhook.headers.get("x-token").map(String::as_str), Some("secret"));
        assert_eq!(settings.delivery.webhook.timeout_secs, 10);
        assert!(settings.delivery.log.enabled);
        assert_eq!(settings.github, GithubConfig::default());
    }

    #[test]
    fn test_logger_settings_into_logger_config() {
        let mut settings = LoggerSettings::default();
        settings.file.enabled = true;
        settings.file.format = "compact".to_string();
        settings.console.format = "json".to_string();

        let config = settings.into_logger_config().unwrap();
        assert!(config.file.enabled);
        assert_eq!(config.file.format, LogFormat::Compact);
        assert_eq!(config.console.format, LogFormat::Json);
        assert_eq!(config.file.path, PathBuf::from("logs/runwatch.log"));
    }

    #[test]
    fn test_logger_settings_invalid_format() {
        let mut settings = LoggerSettings::default();
        settings.file.format = "xml".to_string();

        match settings.into_logger_config() {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "logger.file.format"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_logger_settings_invalid_level() {
        let mut settings = LoggerSettings::default();
        settings.level = "loud".to_string();
        assert!(settings.into_logger_config().is_err());
    }
}
