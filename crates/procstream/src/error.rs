//! Error types for process supervision

use std::io;
use thiserror::Error;

use crate::stream::StreamKind;

/// Process supervision errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to spawn process
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// No data arrived on an output stream within the idle timeout
    #[error("No data on {stream} for {millis}ms")]
    StdioTimeout { stream: StreamKind, millis: u64 },

    /// Reading from an output stream failed
    #[error("Failed to read {stream}: {source}")]
    Io {
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    /// The process's stdin is no longer accepting data
    #[error("Process stdin is closed")]
    StdinClosed,

    /// Waiting for the process to exit failed
    #[error("Failed to wait for process: {0}")]
    WaitFailed(#[source] io::Error),

    /// Failed to kill process
    #[error("Failed to kill process: {0}")]
    KillFailed(String),

    /// Invalid configuration
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
