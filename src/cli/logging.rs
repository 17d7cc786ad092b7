//! Log subscriber setup
//!
//! Logs go to stderr so stdout stays pure JSON lines.

use tracing_subscriber::EnvFilter;

use super::errors::{CliError, CliResult};

/// Installs the global subscriber.
///
/// `directive` uses `EnvFilter` syntax (`warn`, `querier=debug`, ...).
pub fn init_logging(directive: &str, json: bool) -> CliResult<()> {
    let filter = EnvFilter::try_new(directive).map_err(|e| {
        CliError::logging_error(format!("invalid log filter '{}': {}", directive, e))
    })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| CliError::logging_error(e.to_string()))
}
