//! CLI command implementations.

pub mod config;
pub mod simulate;

use std::path::Path;

use objtrack::config::TrackerConfig;

use crate::error::CliError;

/// Load the configuration named on the command line, or the default file.
///
/// An explicit path must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig, CliError> {
    match path {
        Some(path) => Ok(TrackerConfig::load(path)?),
        None => match TrackerConfig::default_path() {
            Some(path) => Ok(TrackerConfig::load_or_default(path)?),
            None => Ok(TrackerConfig::default()),
        },
    }
}
