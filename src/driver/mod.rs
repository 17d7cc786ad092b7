//! Driver seam
//!
//! The query layer never talks to the network itself. A driver supplies a
//! [`Database`] per connection, a [`Collection`] handle per name, and lazy
//! [`Cursor`]s over matching documents. Query and projection documents flow
//! in; documents and [`DriverError`]s flow out.

mod errors;

use serde_json::{Map, Value};

use crate::connection::ConnectionTarget;

pub use errors::{
    DriverError, DriverResult, AUTHENTICATION_FAILED, BAD_VALUE, UNAUTHORIZED_COMMAND,
    UNRECOGNIZED_STAGE,
};

/// A database document (and the shape of query/projection documents)
pub type Document = Map<String, Value>;

/// Options forwarded to an aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Documents per server round-trip
    pub batch_size: Option<u32>,
    /// Allow stages to spill to disk
    pub allow_disk_use: bool,
}

/// Lazy, server-side sequence of documents
pub trait Cursor {
    /// Pulls the next document; `Ok(None)` once exhausted
    fn next_document(&mut self) -> DriverResult<Option<Document>>;

    /// Releases the server-side cursor
    fn close(&mut self);
}

/// Query operations on one named collection
pub trait Collection {
    /// Returns the collection name
    fn name(&self) -> &str;

    /// Opens a cursor over documents matching `query`
    fn find(&self, query: &Document, projection: Option<&Document>) -> DriverResult<Box<dyn Cursor>>;

    /// Returns the first document matching `query`
    fn find_one(&self, query: &Document) -> DriverResult<Option<Document>>;

    /// Counts documents matching `query`
    fn count_documents(&self, query: &Document) -> DriverResult<u64>;

    /// Returns the collection size from metadata
    fn estimated_document_count(&self) -> DriverResult<u64>;

    /// Returns the distinct values of `field`
    fn distinct(&self, field: &str) -> DriverResult<Vec<Value>>;

    /// Runs an aggregation pipeline
    fn aggregate(
        &self,
        pipeline: &[Document],
        options: &AggregateOptions,
    ) -> DriverResult<Box<dyn Cursor>>;
}

/// A connected database
pub trait Database {
    /// Round-trips to the server to verify the connection and credentials
    fn ping(&self) -> DriverResult<()>;

    /// Lists every collection, system collections included
    fn list_collection_names(&self) -> DriverResult<Vec<String>>;

    /// Returns a handle to a named collection
    fn collection(&self, name: &str) -> Box<dyn Collection>;

    /// Closes the underlying client
    fn close(&mut self);
}

/// Opens database connections
pub trait Driver {
    /// Connects to the database described by `target`
    fn connect(&self, target: &ConnectionTarget) -> DriverResult<Box<dyn Database>>;
}
