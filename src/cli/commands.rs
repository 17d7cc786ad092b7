//! CLI command implementations
//!
//! Each run opens one connection against the in-memory driver, executes a
//! single command, writes JSON lines and closes the connection.

use std::io::Write;

use serde_json::Value;
use tracing::info;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{parse_query, stdout, write_line, write_lines};
use super::logging::init_logging;
use crate::connection::{CollectionScope, Connection, ConnectionTarget};
use crate::filter::Filter;
use crate::memory::{MemoryDatabase, MemoryDriver};

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(&cli.log_level, cli.log_json)?;
    execute(&cli, &mut stdout())
}

/// Opens the connection, runs the command, closes the connection
pub fn execute<W: Write>(cli: &Cli, out: &mut W) -> CliResult<()> {
    let mut connection = open_connection(cli)?;
    let result = run_command(&mut connection, &cli.command, out);
    connection.close();
    result
}

/// Run the appropriate command on an open connection
pub fn run_command<W: Write>(
    connection: &mut Connection,
    cmd: &Command,
    out: &mut W,
) -> CliResult<()> {
    match cmd {
        Command::Collections => {
            let names = connection.list_available_collections()?;
            write_lines(out, names.into_iter().map(Ok))?;
        }
        Command::Count { filter, collection } => {
            let filter = parse_filter(filter.as_deref())?;
            let total = connection.count_entries(filter.as_ref(), collection.as_deref())?;
            write_lines(out, [Ok(total)])?;
        }
        Command::Extract {
            filter,
            fields,
            collections,
            limit,
        } => {
            let filter = parse_filter(filter.as_deref())?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let stream = connection
                .extract(filter.as_ref(), &fields, scope(collections))?
                .limit(*limit);
            let written = write_lines(out, stream.map(|doc| doc.map_err(CliError::from)))?;
            info!(written, "extraction finished");
        }
        Command::ExtractOne {
            filter,
            collections,
        } => {
            let filter = parse_filter(filter.as_deref())?;
            let found = connection.extract_one(filter.as_ref(), scope(collections))?;
            write_line(out, &found.map(Value::Object).unwrap_or(Value::Null))?;
            out.flush()?;
        }
        Command::Distinct { field } => {
            let values = connection.distinct(field)?;
            write_lines(out, values.into_iter().map(Ok))?;
        }
    }
    Ok(())
}

fn open_connection(cli: &Cli) -> CliResult<Connection> {
    let database = MemoryDatabase::new();
    if let Some(dir) = &cli.data {
        let loaded = database
            .load_dir(dir)
            .map_err(|e| CliError::io_error(e.to_string()))?;
        info!(dir = %dir.display(), collections = loaded, "data directory loaded");
    }
    let driver = MemoryDriver::new()
        .with_database(&cli.database, database)
        .map_err(|e| CliError::io_error(e.to_string()))?;

    let connection = match &cli.credentials {
        Some(path) => Connection::open(&driver, &cli.database, path)?,
        None => Connection::connect(&driver, &local_target(&cli.database))?,
    };
    Ok(connection)
}

fn local_target(database: &str) -> ConnectionTarget {
    ConnectionTarget {
        database: database.to_string(),
        host: "localhost".to_string(),
        port: 27017,
        user: String::new(),
        password: String::new(),
    }
}

fn parse_filter(raw: Option<&str>) -> CliResult<Option<Filter>> {
    raw.map(|raw| -> CliResult<Filter> { Ok(Filter::from_query(&parse_query(raw)?)?) })
        .transpose()
}

fn scope(collections: &[String]) -> CollectionScope {
    if collections.is_empty() {
        CollectionScope::All
    } else {
        CollectionScope::only(collections.iter().cloned())
    }
}
