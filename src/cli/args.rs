//! CLI argument definitions using clap
//!
//! Commands:
//! - querier <DB> collections
//! - querier <DB> count [--filter JSON] [--collection C]
//! - querier <DB> extract [--filter JSON] [--fields a,b] [--collections x,y] [--limit N]
//! - querier <DB> extract-one [--filter JSON] [--collections x,y]
//! - querier <DB> distinct FIELD

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Querier - filter and extract documents across collections
#[derive(Parser, Debug)]
#[command(name = "querier")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Credentials file; without it the local database is opened anonymously
    #[arg(long, env = "QUERIER_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Directory of *.json / *.jsonl collections served by the in-memory driver
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Log filter directive, e.g. "debug" or "querier=trace"
    #[arg(long, env = "QUERIER_LOG", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Database name
    pub database: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List available collections
    Collections,

    /// Count matching documents
    Count {
        /// Query document, e.g. '{"lang": {"$eq": "es"}}'
        #[arg(long)]
        filter: Option<String>,

        /// Count in this collection only
        #[arg(long)]
        collection: Option<String>,
    },

    /// Print matching documents, one JSON object per line
    Extract {
        /// Query document
        #[arg(long)]
        filter: Option<String>,

        /// Fields to keep
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Collections to search, in order
        #[arg(long, value_delimiter = ',')]
        collections: Vec<String>,

        /// Maximum number of documents; 0 means no limit
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },

    /// Print the first matching document
    ExtractOne {
        /// Query document
        #[arg(long)]
        filter: Option<String>,

        /// Collections to search, in order
        #[arg(long, value_delimiter = ',')]
        collections: Vec<String>,
    },

    /// Print every distinct value of a field
    Distinct {
        /// Dotted field path
        field: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
