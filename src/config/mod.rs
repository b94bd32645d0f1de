//! Layered configuration for runwatch
//!
//! TOML files from `config/` (or a single file) overlaid with `RUNWATCH_*`
//! environment variables; see [`ConfigLoader`] for the precedence rules.

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    AlertSourceConfig, DeliveryConfig, GithubConfig, LoggerSettings, Settings, SourcesConfig,
    UserAlertSourceConfig, WebhookDeliveryConfig, WorkflowRunsSourceConfig,
};
