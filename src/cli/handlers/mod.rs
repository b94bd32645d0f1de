//! Command handlers for CLI operations
//!
//! Each handler owns the merged settings and carries out one subcommand.

pub mod poll_once;
pub mod run;
pub mod sources;

pub use poll_once::PollOnceCommandHandler;
pub use run::RunCommandHandler;
pub use sources::SourcesCommandHandler;
