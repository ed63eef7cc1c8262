//! CLI error type.

use std::fmt;

use objtrack::config::ConfigError;
use objtrack::diagnostics::DiagnosticsError;
use objtrack::logging::LoggingError;

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Diagnostics(DiagnosticsError),
    /// Tokio runtime could not be created.
    Runtime(std::io::Error),
    /// Ctrl-C handler could not be installed.
    Signal(ctrlc::Error),
    Output(serde_json::Error),
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Diagnostics(e) => write!(f, "Diagnostics error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Signal(e) => write!(f, "Failed to install signal handler: {}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Diagnostics(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Signal(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<DiagnosticsError> for CliError {
    fn from(e: DiagnosticsError) -> Self {
        CliError::Diagnostics(e)
    }
}

impl From<ctrlc::Error> for CliError {
    fn from(e: ctrlc::Error) -> Self {
        CliError::Signal(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}
