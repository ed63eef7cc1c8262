//! Configuration CLI commands.
//!
//! Provides `config show`, `config default`, `config check` and `config path`
//! for inspecting and validating tracker configuration files.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use objtrack::config::TrackerConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as INI
    Show,

    /// Print the built-in defaults as INI
    Default,

    /// Validate a configuration file
    Check {
        /// Path to the INI file
        path: PathBuf,
    },

    /// Show the default configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = super::load_config(config_path)?;
            print!("{}", config.to_ini_string()?);
            Ok(())
        }
        ConfigCommands::Default => {
            print!("{}", TrackerConfig::default().to_ini_string()?);
            Ok(())
        }
        ConfigCommands::Check { path } => run_check(&path),
        ConfigCommands::Path => {
            match TrackerConfig::default_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no configuration directory on this platform)"),
            }
            Ok(())
        }
    }
}

fn run_check(path: &Path) -> Result<(), CliError> {
    let config = TrackerConfig::load(path)?;
    println!("{} is valid", path.display());
    println!(
        "  search: {} (far {} m, fov {}°)",
        config.search.area_shape,
        config.search.frustum_far_distance,
        config.search.frustum_horizontal_fov_degrees
    );
    println!(
        "  strategy: tracking {}, detection {}, refinement {}",
        config.strategy.tracking,
        config.strategy.detection,
        if config.strategy.area_refinement {
            "on"
        } else {
            "off"
        }
    );
    Ok(())
}
