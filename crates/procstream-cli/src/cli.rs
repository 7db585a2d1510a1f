// Command line arguments

use clap::Parser;
use procstream::ProcessConfig;
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};

/// Run a command under supervision and relay its stdio
#[derive(Parser, Debug)]
#[command(name = "procstream")]
#[command(bin_name = "procstream")]
#[command(about = "Run a command under supervision and relay its stdio")]
#[command(version)]
pub struct Cli {
    /// YAML file with a process configuration; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Working directory for the command
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable for the command (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Give up on stdout/stderr after this long without data
    #[arg(long, value_name = "MILLIS")]
    pub stdio_timeout_ms: Option<u64>,

    /// Run the command in its own process group and kill the whole group
    #[arg(long)]
    pub process_group: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Program followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Merge the config file (if any) with the flags
    pub fn to_process_config(&self) -> CliResult<ProcessConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProcessConfig::default(),
        };

        if !self.command.is_empty() {
            let from_flags = ProcessConfig::from_command_line(self.command.iter().cloned())?;
            config.command = from_flags.command;
            config.args = from_flags.args;
        }

        if let Some(ref dir) = self.cwd {
            config.working_dir = Some(dir.clone());
        }

        for assignment in &self.env {
            let (key, value) = parse_env(assignment)?;
            config.env.insert(key, value);
        }

        if let Some(millis) = self.stdio_timeout_ms {
            config = config.stdio_timeout_ms(millis);
        }

        if self.process_group {
            config.process_group = true;
        }

        if config.command.is_empty() {
            return Err(CliError::InvalidArgument {
                message: "no command given".to_string(),
            });
        }
        config.validate()?;
        Ok(config)
    }
}

/// Split a `KEY=VALUE` assignment
pub fn parse_env(assignment: &str) -> CliResult<(String, String)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidArgument {
            message: format!("expected KEY=VALUE, got '{}'", assignment),
        }),
    }
}

/// Load a process configuration from YAML
pub fn load_config(path: &Path) -> CliResult<ProcessConfig> {
    let text = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&text)
        .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_command_after_separator() {
        let cli = Cli::parse_from(["procstream", "--", "ls", "-la", "/tmp"]);
        let config = cli.to_process_config().unwrap();
        assert_eq!(config.command, "ls");
        assert_eq!(config.args, vec!["-la", "/tmp"]);
    }

    #[test]
    fn test_flags_applied() {
        let cli = Cli::parse_from([
            "procstream",
            "--cwd",
            "/tmp",
            "-e",
            "A=1",
            "--env",
            "B=x=y",
            "--stdio-timeout-ms",
            "500",
            "--process-group",
            "--",
            "env",
        ]);
        let config = cli.to_process_config().unwrap();
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(config.env.get("B").map(String::as_str), Some("x=y"));
        assert_eq!(config.stdio_timeout, Some(Duration::from_millis(500)));
        assert!(config.process_group);
    }

    #[test]
    fn test_missing_command() {
        let cli = Cli::parse_from(["procstream"]);
        assert!(matches!(
            cli.to_process_config(),
            Err(CliError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_env() {
        assert_eq!(parse_env("K=V").unwrap(), ("K".to_string(), "V".to_string()));
        assert_eq!(parse_env("K=").unwrap(), ("K".to_string(), String::new()));
        assert!(parse_env("novalue").is_err());
        assert!(parse_env("=v").is_err());
    }

    #[test]
    fn test_config_file_overridden_by_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "command: sleep\nargs: [\"5\"]\nstdio_timeout_ms: 100\nenv:\n  FROM_FILE: file"
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["procstream", "--config", path.as_str(), "--stdio-timeout-ms", "900"]);
        let config = cli.to_process_config().unwrap();
        assert_eq!(config.command, "sleep");
        assert_eq!(config.args, vec!["5"]);
        assert_eq!(config.env.get("FROM_FILE").map(String::as_str), Some("file"));
        assert_eq!(config.stdio_timeout, Some(Duration::from_millis(900)));
    }

    #[test]
    fn test_bad_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "command: [not, a, string]").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["procstream", "--config", path.as_str()]);
        assert!(matches!(cli.to_process_config(), Err(CliError::Config(_))));
    }
}
