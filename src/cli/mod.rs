//! CLI module for querier
//!
//! Provides a command-line front end over the in-memory driver:
//! - collections: list available collections
//! - count: count matching documents
//! - extract / extract-one: print matching documents
//! - distinct: print distinct field values

mod args;
mod commands;
mod errors;
mod io;
mod logging;

pub use args::{Cli, Command};
pub use commands::{execute, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_query, write_line, write_lines};
pub use logging::init_logging;
