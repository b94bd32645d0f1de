//! Configuration merger for CLI arguments and config files
//!
//! Loads the settings the way the CLI asked for (layered or single file,
//! optional environment override) and applies the global flag overrides.

use std::path::Path;

use super::parser::Cli;
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, Settings};

/// Applies CLI overrides on top of file-based configuration
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Loads `config_path` in single-file mode, or the layered directory
    /// when it is `None`. `environment` overrides `RUNWATCH_APP_ENV`.
    pub fn load(
        config_path: Option<&Path>,
        environment: Option<Environment>,
    ) -> Result<Self, ConfigError> {
        let loader = match config_path {
            Some(path) => ConfigLoader::from_file(path),
            None => ConfigLoader::new()?,
        };
        let loader = match environment {
            Some(environment) => loader.with_environment(environment),
            None => loader,
        };

        tracing::debug!(
            environment = %loader.environment(),
            config_file = ?loader.config_file(),
            "Loading configuration"
        );
        Ok(Self::new(loader.load()?))
    }

    /// A copy of the base settings with the CLI overrides applied, validated
    /// again.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "warn".to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}
