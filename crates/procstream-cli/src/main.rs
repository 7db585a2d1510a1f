// procstream entry point

use anyhow::{Context, Result};
use clap::Parser;
use procstream_cli::{logging, run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let config = cli
        .to_process_config()
        .context("Invalid command configuration")?;
    let exit_code = run::run(config)
        .await
        .context("Failed to supervise command")?;

    // Skip runtime teardown; a blocking stdin read would hold it open
    std::process::exit(exit_code);
}
