use clap::Parser;

use runwatch::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = cli::load_and_merge_config(&cli)?;
    let _log_handle = cli::init_logger_from_settings(&settings)?;

    tracing::debug!(version = runwatch::pkg_version(), command = ?cli.selected_command(), "Starting");
    cli::execute_command(&cli, settings).await?;
    Ok(())
}
