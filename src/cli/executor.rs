//! Command executor for dispatching CLI commands
//!
//! Dispatches the parsed command to its handler once configuration is
//! merged and the logger is installed.

use super::handlers::{PollOnceCommandHandler, RunCommandHandler, SourcesCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Settings;
use crate::error::AppResult;

/// Execute the command selected by `cli` with the merged `settings`.
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    match cli.selected_command() {
        Commands::Run { dry_run } => RunCommandHandler::new(settings).execute(dry_run).await,
        Commands::Sources { json } => SourcesCommandHandler::new(settings).execute(json),
        Commands::PollOnce { source_id, since } => {
            let count = PollOnceCommandHandler::new(settings)
                .execute(&source_id, since)
                .await?;
            tracing::info!(source_id = %source_id, count, "Poll completed");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use clap::Parser;

    #[tokio::test]
    async fn test_execute_run_dry_run() {
        let cli = Cli::try_parse_from(["runwatch", "run", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_sources() {
        let cli = Cli::try_parse_from(["runwatch", "sources"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_poll_once_unknown_source() {
        let cli = Cli::try_parse_from(["runwatch", "poll-once", "missing"]).unwrap();
        let err = execute_command(&cli, Settings::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
