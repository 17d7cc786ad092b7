//! Query construction
//!
//! Builds a predicate tree and compiles it into the query document the
//! database understands:
//!
//! - leaf: `{field: {operator: value, ...}, ...}`
//! - composite: `{"$or" | "$and": [document, ...]}`
//!
//! # Invariants
//!
//! - A filter is a leaf or a composite, never both
//! - An empty filter matches every document
//! - Combining requires two non-empty, distinct filters
//! - Construction errors surface at the offending call

mod errors;
mod filter;
mod geo;
mod node;
mod operator;

pub use errors::{FilterError, FilterResult};
pub use filter::Filter;
pub use geo::{Geometry, Position, Ring, ShapeKind};
pub use node::{FieldConditions, FilterNode};
pub use operator::{Combinator, Operator};
