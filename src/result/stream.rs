//! Fan-out result stream
//!
//! Drains one cursor per collection, in attach order, as a single sequence.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error};

use crate::driver::{Cursor, Document};
use crate::error::{QueryError, QueryResult};

/// A named cursor
struct Source {
    name: String,
    cursor: Box<dyn Cursor>,
}

/// Bookkeeping shared between a stream and its connection's registry
#[derive(Default)]
struct StreamState {
    sources: Vec<Source>,
    /// Index of the source currently being drained
    position: usize,
    /// Documents yielded since the last restart
    returned: usize,
    /// 0 = unlimited
    limit: usize,
    closed: bool,
    failed: bool,
}

impl StreamState {
    fn limit_reached(&self) -> bool {
        self.limit > 0 && self.returned >= self.limit
    }

    fn next_document(&mut self) -> Option<QueryResult<Document>> {
        loop {
            if self.closed
                || self.failed
                || self.limit_reached()
                || self.position >= self.sources.len()
            {
                return None;
            }

            let source = &mut self.sources[self.position];
            match source.cursor.next_document() {
                Ok(Some(doc)) => {
                    self.returned += 1;
                    return Some(Ok(doc));
                }
                Ok(None) => {
                    debug!(collection = %source.name, "end of cursor");
                    self.position += 1;
                }
                Err(err) if err.is_unauthorized() => {
                    // e.g. system.profile denies reads to regular users
                    debug!(collection = %source.name, "collection not authorized, skipping");
                    self.position += 1;
                }
                Err(err) => {
                    error!(collection = %source.name, error = %err, "unhandled error in result");
                    self.failed = true;
                    return Some(Err(QueryError::Internal(err)));
                }
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        debug!(cursors = self.sources.len(), "closing result");
        for source in &mut self.sources {
            source.cursor.close();
        }
        self.sources.clear();
        self.position = 0;
        self.closed = true;
    }
}

impl Drop for StreamState {
    fn drop(&mut self) {
        self.close();
    }
}

/// Documents matched by one extraction across several collections.
///
/// Sources are drained in order, one at a time. A source whose cursor
/// reports "unauthorized command" is skipped; any other cursor error ends
/// the stream after being yielded once.
///
/// ```
/// use querier::ResultStream;
///
/// let mut stream = ResultStream::new().limit(100);
/// assert_eq!(stream.next().map(|r| r.is_ok()), None);
/// ```
pub struct ResultStream {
    state: Rc<RefCell<StreamState>>,
}

impl ResultStream {
    /// Creates a stream with no sources
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(StreamState::default())),
        }
    }

    /// Appends named cursors to the source list.
    ///
    /// On a closed stream the cursors are closed and discarded.
    pub fn attach<I, S>(&mut self, sources: I)
    where
        I: IntoIterator<Item = (S, Box<dyn Cursor>)>,
        S: Into<String>,
    {
        let mut state = self.state.borrow_mut();
        if state.closed {
            for (_, mut cursor) in sources {
                cursor.close();
            }
            debug!("cursors attached to a closed result, closed");
            return;
        }
        state.sources.extend(sources.into_iter().map(|(name, cursor)| Source {
            name: name.into(),
            cursor,
        }));
        debug!(cursors = state.sources.len(), "cursors attached");
    }

    /// Caps the number of documents returned; `qty <= 0` means no cap
    pub fn limit(self, qty: i64) -> Self {
        self.set_limit(qty);
        self
    }

    /// Caps the number of documents returned; `qty <= 0` means no cap
    pub fn set_limit(&self, qty: i64) {
        self.state.borrow_mut().limit = usize::try_from(qty.max(0)).unwrap_or(usize::MAX);
    }

    /// Resets the source index and returned count.
    ///
    /// Cursors are not rewound: documents already pulled stay consumed.
    pub fn restart(&mut self) -> &mut Self {
        let mut state = self.state.borrow_mut();
        state.position = 0;
        state.returned = 0;
        debug!(cursors = state.sources.len(), "start result loop");
        drop(state);
        self
    }

    /// Closes every cursor; the stream yields nothing afterwards
    pub fn close(&mut self) {
        self.state.borrow_mut().close();
    }

    /// True once [`ResultStream::close`] ran, here or from the connection
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Documents yielded since the last restart
    pub fn returned(&self) -> usize {
        self.state.borrow().returned
    }

    /// Names of the attached sources, in drain order
    pub fn source_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .sources
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Returns a weak handle that can close this stream later
    pub(crate) fn handle(&self) -> StreamHandle {
        StreamHandle {
            state: Rc::downgrade(&self.state),
        }
    }
}

impl Default for ResultStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ResultStream {
    type Item = QueryResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.state.borrow_mut().next_document();
        if item.is_none() {
            debug!("result finished");
        }
        item
    }
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ResultStream")
            .field("sources", &state.sources.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("position", &state.position)
            .field("returned", &state.returned)
            .field("limit", &state.limit)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Weak reference held by the connection's stream registry
#[derive(Clone)]
pub(crate) struct StreamHandle {
    state: Weak<RefCell<StreamState>>,
}

impl StreamHandle {
    /// Closes the stream if it is still alive
    pub(crate) fn close(&self) {
        if let Some(state) = self.state.upgrade() {
            state.borrow_mut().close();
        }
    }

    /// True while the stream has not been dropped
    pub(crate) fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverError, DriverResult};
    use serde_json::json;
    use std::collections::VecDeque;

    /// Scripted cursor: yields each entry in order, then `Ok(None)`
    struct ScriptedCursor {
        steps: VecDeque<DriverResult<Document>>,
        closed: Rc<RefCell<bool>>,
    }

    impl ScriptedCursor {
        fn boxed(steps: Vec<DriverResult<Document>>) -> (Box<dyn Cursor>, Rc<RefCell<bool>>) {
            let closed = Rc::new(RefCell::new(false));
            let cursor = Self {
                steps: steps.into(),
                closed: Rc::clone(&closed),
            };
            (Box::new(cursor), closed)
        }
    }

    impl Cursor for ScriptedCursor {
        fn next_document(&mut self) -> DriverResult<Option<Document>> {
            match self.steps.pop_front() {
                Some(Ok(doc)) => Ok(Some(doc)),
                Some(Err(err)) => Err(err),
                None => Ok(None),
            }
        }

        fn close(&mut self) {
            *self.closed.borrow_mut() = true;
        }
    }

    fn doc(tag: &str) -> Document {
        let mut d = Document::new();
        d.insert("tag".to_string(), json!(tag));
        d
    }

    fn docs(prefix: &str, n: usize) -> Vec<DriverResult<Document>> {
        (1..=n).map(|i| Ok(doc(&format!("{}-doc{}", prefix, i)))).collect()
    }

    fn tags(stream: &mut ResultStream) -> Vec<String> {
        stream
            .map(|r| r.unwrap()["tag"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_empty_stream_finishes() {
        let mut stream = ResultStream::new();
        assert!(stream.next().is_none());
        assert_eq!(stream.returned(), 0);
    }

    #[test]
    fn test_sources_drained_in_order() {
        let (a, _) = ScriptedCursor::boxed(docs("a", 2));
        let (b, _) = ScriptedCursor::boxed(docs("b", 1));
        let mut stream = ResultStream::new();
        stream.attach(vec![("a", a), ("b", b)]);

        assert_eq!(tags(&mut stream), vec!["a-doc1", "a-doc2", "b-doc1"]);
        assert_eq!(stream.returned(), 3);
    }

    #[test]
    fn test_unauthorized_source_skipped() {
        let (src1, _) = ScriptedCursor::boxed(docs("src1", 2));
        let (src2, _) = ScriptedCursor::boxed(vec![Err(DriverError::unauthorized("system.profile"))]);
        let (src3, _) = ScriptedCursor::boxed(docs("src3", 2));
        let mut stream = ResultStream::new();
        stream.attach(vec![("src1", src1), ("src2", src2), ("src3", src3)]);

        assert_eq!(
            tags(&mut stream),
            vec!["src1-doc1", "src1-doc2", "src3-doc1", "src3-doc2"]
        );
    }

    #[test]
    fn test_other_errors_propagate_once() {
        let mut steps = docs("a", 1);
        steps.push(Err(DriverError::operation(2, "bad value")));
        let (a, _) = ScriptedCursor::boxed(steps);
        let (b, _) = ScriptedCursor::boxed(docs("b", 1));
        let mut stream = ResultStream::new();
        stream.attach(vec![("a", a), ("b", b)]);

        assert!(stream.next().unwrap().is_ok());
        let err = stream.next().unwrap().unwrap_err();
        assert_eq!(err.driver_error().and_then(DriverError::code), Some(2));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_limit_stops_early() {
        let (a, _) = ScriptedCursor::boxed(docs("a", 10));
        let mut stream = ResultStream::new().limit(3);
        stream.attach(vec![("a", a)]);

        assert_eq!(stream.by_ref().count(), 3);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_non_positive_limit_is_unlimited() {
        let (a, _) = ScriptedCursor::boxed(docs("a", 4));
        let mut stream = ResultStream::new().limit(-5);
        stream.attach(vec![("a", a)]);
        assert_eq!(stream.count(), 4);
    }

    #[test]
    fn test_limit_spans_sources() {
        let (a, _) = ScriptedCursor::boxed(docs("a", 2));
        let (b, _) = ScriptedCursor::boxed(docs("b", 2));
        let mut stream = ResultStream::new().limit(3);
        stream.attach(vec![("a", a), ("b", b)]);
        assert_eq!(tags(&mut stream), vec!["a-doc1", "a-doc2", "b-doc1"]);
    }

    #[test]
    fn test_attach_after_close_closes_late_cursors() {
        let mut stream = ResultStream::new();
        stream.close();

        let (late, late_closed) = ScriptedCursor::boxed(docs("late", 2));
        stream.attach(vec![("late", late)]);
        assert!(*late_closed.borrow());
        assert!(stream.source_names().is_empty());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_close_releases_cursors() {
        let (a, a_closed) = ScriptedCursor::boxed(docs("a", 3));
        let (b, b_closed) = ScriptedCursor::boxed(docs("b", 3));
        let mut stream = ResultStream::new();
        stream.attach(vec![("a", a), ("b", b)]);

        stream.close();
        assert!(*a_closed.borrow());
        assert!(*b_closed.borrow());
        assert!(stream.is_closed());
        assert!(stream.source_names().is_empty());
        assert!(stream.next().is_none());

        stream.close();
        assert!(stream.restart().next().is_none());
    }

    #[test]
    fn test_restart_does_not_rewind() {
        let (a, _) = ScriptedCursor::boxed(docs("a", 4));
        let mut stream = ResultStream::new().limit(2);
        stream.attach(vec![("a", a)]);

        assert_eq!(tags(&mut stream), vec!["a-doc1", "a-doc2"]);
        stream.restart();
        assert_eq!(stream.returned(), 0);
        assert_eq!(tags(&mut stream), vec!["a-doc3", "a-doc4"]);
    }

    #[test]
    fn test_handle_closes_stream() {
        let (a, a_closed) = ScriptedCursor::boxed(docs("a", 2));
        let mut stream = ResultStream::new();
        stream.attach(vec![("a", a)]);

        let handle = stream.handle();
        assert!(handle.is_alive());
        handle.close();
        assert!(*a_closed.borrow());
        assert!(stream.next().is_none());

        drop(stream);
        assert!(!handle.is_alive());
        handle.close();
    }
}
