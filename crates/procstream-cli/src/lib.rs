//! Command line front end for `procstream`
//!
//! Runs a single command under supervision, relays the terminal's stdio to it
//! and exits with the command's exit code.

pub mod cli;
pub mod error;
pub mod logging;
pub mod run;

pub use cli::Cli;
pub use error::{CliError, CliResult};
