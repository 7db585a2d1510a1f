// Logging setup for the CLI

use tracing::Level;

/// Map a level name to a tracing level, defaulting to WARN
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

/// Install the global subscriber
///
/// Logs go to stderr so they never mix with the child's stdout.
pub fn init_logging(level: &str) {
    let level = parse_level(level);
    let verbose = level >= Level::DEBUG;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(verbose)
        .with_thread_ids(verbose)
        .with_writer(std::io::stderr)
        .init();
}
