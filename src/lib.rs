//! querier - composable filters and fan-out result streams for document
//! databases
//!
//! A [`Filter`] compiles to a query document. A [`Connection`] runs it over
//! one or many collections and returns a [`ResultStream`] that merges the
//! per-collection cursors into one sequence.

pub mod cli;
pub mod connection;
pub mod driver;
mod error;
pub mod filter;
pub mod memory;
pub mod result;

pub use connection::{CollectionScope, Connection, ConnectionTarget, CredentialsError};
pub use driver::Document;
pub use error::{QueryError, QueryResult};
pub use filter::{Combinator, Filter, FilterError, FilterResult, Geometry, Operator, ShapeKind};
pub use result::ResultStream;
