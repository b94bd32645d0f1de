//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Polls GitHub Actions and other sources and delivers normalized notifications
#[derive(Parser, Debug)]
#[command(name = "runwatch")]
#[command(about = "Polls GitHub Actions and delivers normalized notifications")]
#[command(long_about = "
runwatch polls a set of notification sources on fixed intervals, normalizes
what they report into a uniform notification model and hands every
notification to the configured delivery providers (structured log, webhook).

EXAMPLES:
    # Start every enabled source with the layered configuration
    runwatch

    # Use a single configuration file
    runwatch --config /etc/runwatch/runwatch.toml run

    # Validate configuration and show what would be started
    runwatch run --dry-run

    # List configured sources
    runwatch sources

    # Fetch once from a source and print the notifications as JSON lines
    runwatch poll-once github-actions-workflow-runs --since 2024-05-01T00:00:00Z
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered `config/` directory.
    /// `RUNWATCH_*` environment variables still apply on top of it.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` layer is loaded. Takes precedence
    /// over `RUNWATCH_APP_ENV`.
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Raises the log level to debug. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    ///
    /// Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start all enabled sources and the notification dispatcher (default)
    ///
    /// Runs until interrupted with Ctrl-C, then cancels every poller and
    /// delivers notifications that are already queued.
    ///
    /// Examples:
    ///   runwatch run
    ///   runwatch run --dry-run
    Run {
        /// Validate configuration, print the source table and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// List configured sources with their interval and enabled flag
    Sources {
        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch and normalize once from a single source
    ///
    /// Prints each notification as one JSON line. Works for disabled sources
    /// too.
    ///
    /// Examples:
    ///   runwatch poll-once github-actions-notification-source
    ///   runwatch poll-once github-actions-workflow-runs --since 2024-05-01T00:00:00Z
    PollOnce {
        /// Identifier of the source to poll
        #[arg(value_name = "SOURCE_ID")]
        source_id: String,

        /// Only report events at or after this RFC 3339 instant
        ///
        /// Defaults to one interval of the source before now.
        #[arg(long, value_name = "TIMESTAMP", value_parser = super::validation::validate_timestamp)]
        since: Option<jiff::Timestamp>,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

impl Cli {
    /// The command to run, `run` when none was given.
    pub fn selected_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Run { dry_run: false })
    }
}
