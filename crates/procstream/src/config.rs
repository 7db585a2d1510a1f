//! Process configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProcessError, Result};

/// Default size of a single chunk read from stdout/stderr
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Configuration for spawning a supervised process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Executable command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// Idle timeout for stdout/stderr (None = wait forever)
    #[serde(
        rename = "stdio_timeout_ms",
        with = "duration_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub stdio_timeout: Option<Duration>,
    /// Size of each chunk read from stdout/stderr
    pub buffer_size: usize,
    /// Spawn the process as leader of its own process group (Unix)
    pub process_group: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl ProcessConfig {
    /// Create new process configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            working_dir: None,
            env: HashMap::new(),
            stdio_timeout: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            process_group: false,
        }
    }

    /// Build a configuration from a full command line (program followed by arguments)
    pub fn from_command_line<I, S>(command_line: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts = command_line.into_iter().map(Into::into);
        let program = parts
            .next()
            .ok_or_else(|| ProcessError::InvalidConfig("command line is empty".to_string()))?;
        Ok(Self::new(program).args(parts))
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the stdout/stderr idle timeout
    pub fn stdio_timeout(mut self, duration: Duration) -> Self {
        self.stdio_timeout = Some(duration);
        self
    }

    /// Set the stdout/stderr idle timeout in milliseconds
    pub fn stdio_timeout_ms(mut self, millis: u64) -> Self {
        self.stdio_timeout = Some(Duration::from_millis(millis));
        self
    }

    /// Set the read chunk size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Enable/disable spawning into a new process group
    pub fn process_group(mut self, enabled: bool) -> Self {
        self.process_group = enabled;
        self
    }

    /// Program followed by its arguments
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Check the configuration before spawning
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            return Err(ProcessError::InvalidConfig(
                "command must not be empty".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ProcessError::InvalidConfig(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.env.keys().any(|k| k.is_empty() || k.contains('=')) {
            return Err(ProcessError::InvalidConfig(
                "environment variable names must be non-empty and must not contain '='"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde helper for `Option<Duration>` as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match val {
            Some(d) => (d.as_millis() as u64).serialize(ser),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(de)?;
        Ok(opt.map(Duration::from_millis))
    }
}
