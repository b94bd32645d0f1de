//! Sources command handler
//!
//! Lists every built-in source with its interval and enabled flag.

use std::fmt::Write as _;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::sources::{SourceDescriptor, describe};

pub struct SourcesCommandHandler {
    config: Settings,
}

impl SourcesCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn execute(&self, json: bool) -> AppResult<()> {
        let descriptors = describe(&self.config);
        if json {
            let out = serde_json::to_string_pretty(&descriptors).map_err(|e| AppError::Internal {
                source: e.into(),
            })?;
            println!("{}", out);
        } else {
            print!("{}", render_table(&descriptors));
        }
        Ok(())
    }
}

/// Fixed-width table of `descriptors`, one line per source.
pub(crate) fn render_table(descriptors: &[SourceDescriptor]) -> String {
    let id_width = descriptors
        .iter()
        .map(|d| d.id.len())
        .max()
        .unwrap_or(0)
        .max("SOURCE".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<7}  {:>10}  DESCRIPTION",
        "SOURCE", "ENABLED", "INTERVAL"
    );
    for d in descriptors {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<7}  {:>10}  {}",
            d.id,
            if d.enabled { "yes" } else { "no" },
            format!("{}ms", d.interval.as_millis()),
            d.description
        );
    }
    out
}
