// CLI error types

use procstream::ProcessError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Supervisor stopped before reporting an exit code")]
    NoExitCode,
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
