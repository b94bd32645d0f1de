//! runwatch
//!
//! Polls notification sources such as GitHub Actions workflow runs on fixed
//! intervals, normalizes what they report and delivers it to pluggable
//! providers.

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod error;
pub mod external;
pub mod logger;
pub mod models;
pub mod poller;
pub mod services;
pub mod sources;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
