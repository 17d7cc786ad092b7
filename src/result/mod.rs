//! Result streams
//!
//! A [`ResultStream`] merges the per-collection cursors of one extraction
//! into a single ordered sequence of documents.
//!
//! # Iteration rules
//!
//! 1. Stop when the limit is reached or every source is exhausted
//! 2. Pull from the current source
//! 3. Exhausted source → move to the next one
//! 4. "Unauthorized command" → move to the next one, silently
//! 5. Any other error → yield it and stop

mod stream;

pub use stream::ResultStream;
pub(crate) use stream::StreamHandle;
