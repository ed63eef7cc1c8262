//! ObjTrack CLI - Command-line interface
//!
//! Runs the object tracker against a simulated detection backend and
//! inspects tracker configuration files.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "objtrack", version = objtrack::VERSION, about = "Locate and track known 3-D object models")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write daily-rolling log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the tracker against a scripted scene
    Simulate(SimulateArgs),

    /// Inspect or validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::simulate::run(args, config, cli.verbose, cli.log_dir)
        }
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    }
}
