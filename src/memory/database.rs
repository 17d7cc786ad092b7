//! In-memory database
//!
//! Collections live behind `Arc<RwLock<..>>`; cursors hold an `Arc` snapshot
//! of the collection and filter lazily on each pull.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, warn};

use super::matcher::Matcher;
use super::projection;
use crate::driver::{
    AggregateOptions, Collection, Cursor, Database, Document, DriverError, DriverResult,
    AUTHENTICATION_FAILED, BAD_VALUE, UNRECOGNIZED_STAGE,
};

/// Collection contents plus an optional injected read failure
#[derive(Debug, Clone, Default)]
struct CollectionData {
    documents: Arc<Vec<Document>>,
    failure: Option<DriverError>,
}

#[derive(Debug, Default)]
struct Store {
    collections: BTreeMap<String, CollectionData>,
    credentials: Option<(String, String)>,
}

/// A shared handle to an in-memory database.
///
/// Clones share the same collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<RwLock<Store>>,
    /// Credentials presented by the connecting client
    presented: Option<(String, String)>,
    offline: bool,
    /// Shared by the collection handles of one session
    closed: Arc<AtomicBool>,
}

impl MemoryDatabase {
    /// Creates an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends documents to a collection, creating it if needed
    pub fn insert_many<I>(&self, collection: &str, documents: I) -> DriverResult<()>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut store = self.write()?;
        let data = store.collections.entry(collection.to_string()).or_default();
        Arc::make_mut(&mut data.documents).extend(documents);
        Ok(())
    }

    /// Makes every read of `collection` fail with "unauthorized command"
    pub fn deny(&self, collection: &str) -> DriverResult<()> {
        self.fail_reads(collection, DriverError::unauthorized(collection))
    }

    /// Makes every read of `collection` fail with `error`
    pub fn fail_reads(&self, collection: &str, error: DriverError) -> DriverResult<()> {
        let mut store = self.write()?;
        store.collections.entry(collection.to_string()).or_default().failure = Some(error);
        Ok(())
    }

    /// Requires clients to present these credentials
    pub fn require_credentials(&self, user: &str, password: &str) -> DriverResult<()> {
        self.write()?.credentials = Some((user.to_string(), password.to_string()));
        Ok(())
    }

    /// Loads every `*.json` (array of objects) and `*.jsonl` (one object per
    /// line) file in `dir` as a collection named after the file stem
    pub fn load_dir(&self, dir: &Path) -> DriverResult<usize> {
        let entries = fs::read_dir(dir).map_err(|err| {
            DriverError::Other(format!("cannot read data directory {}: {}", dir.display(), err))
        })?;

        let mut loaded = 0;
        let mut paths: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            let parse = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => parse_json_array,
                Some("jsonl") => parse_json_lines,
                _ => continue,
            };
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path).map_err(|err| {
                DriverError::Other(format!("cannot read {}: {}", path.display(), err))
            })?;
            let documents = parse(&content)
                .map_err(|err| DriverError::Other(format!("{}: {}", path.display(), err)))?;

            debug!(collection = name, documents = documents.len(), "collection loaded");
            self.insert_many(name, documents)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// A connected view of this database presenting `credentials`
    pub(crate) fn session(&self, credentials: Option<(String, String)>, offline: bool) -> Self {
        Self {
            store: Arc::clone(&self.store),
            presented: credentials,
            offline,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn read(&self) -> DriverResult<RwLockReadGuard<'_, Store>> {
        self.store
            .read()
            .map_err(|_| DriverError::Other("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> DriverResult<RwLockWriteGuard<'_, Store>> {
        self.store
            .write()
            .map_err(|_| DriverError::Other("memory store lock poisoned".to_string()))
    }
}

impl Database for MemoryDatabase {
    fn ping(&self) -> DriverResult<()> {
        if self.offline {
            return Err(DriverError::ServerSelection(
                "server selection timed out".to_string(),
            ));
        }
        if self.is_closed() {
            return Err(DriverError::ConnectionFailure("client is closed".to_string()));
        }
        let store = self.read()?;
        match &store.credentials {
            Some(required) if self.presented.as_ref() != Some(required) => Err(
                DriverError::operation(AUTHENTICATION_FAILED, "Authentication failed."),
            ),
            _ => Ok(()),
        }
    }

    fn list_collection_names(&self) -> DriverResult<Vec<String>> {
        Ok(self.read()?.collections.keys().cloned().collect())
    }

    fn collection(&self, name: &str) -> Box<dyn Collection> {
        Box::new(MemoryCollection {
            name: name.to_string(),
            database: self.clone(),
        })
    }

    fn close(&mut self) {
        debug!("closing memory client");
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Handle to one collection of a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    database: MemoryDatabase,
}

impl MemoryCollection {
    /// Snapshot of the collection; an unknown name reads as empty
    fn data(&self) -> DriverResult<CollectionData> {
        if self.database.is_closed() {
            return Err(DriverError::ConnectionFailure("client is closed".to_string()));
        }
        let store = self.database.read()?;
        Ok(store.collections.get(&self.name).cloned().unwrap_or_default())
    }

    /// Snapshot that fails right away on an injected failure
    fn readable(&self) -> DriverResult<Arc<Vec<Document>>> {
        let data = self.data()?;
        match data.failure {
            Some(err) => Err(err),
            None => Ok(data.documents),
        }
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, query: &Document, projection: Option<&Document>) -> DriverResult<Box<dyn Cursor>> {
        let matcher = Matcher::compile(query)?;
        let data = self.data()?;
        Ok(Box::new(MemoryCursor {
            documents: data.documents,
            position: 0,
            matcher,
            projection: projection.cloned(),
            failure: data.failure,
            closed: false,
        }))
    }

    fn find_one(&self, query: &Document) -> DriverResult<Option<Document>> {
        let matcher = Matcher::compile(query)?;
        let documents = self.readable()?;
        Ok(documents.iter().find(|doc| matcher.matches(doc)).cloned())
    }

    fn count_documents(&self, query: &Document) -> DriverResult<u64> {
        let matcher = Matcher::compile(query)?;
        let documents = self.readable()?;
        Ok(documents.iter().filter(|doc| matcher.matches(doc)).count() as u64)
    }

    fn estimated_document_count(&self) -> DriverResult<u64> {
        Ok(self.readable()?.len() as u64)
    }

    fn distinct(&self, field: &str) -> DriverResult<Vec<Value>> {
        let documents = self.readable()?;
        let mut values: Vec<Value> = Vec::new();
        for doc in documents.iter() {
            for value in super::matcher::resolve_path(doc, field) {
                let elements = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                for element in elements {
                    if !values.contains(&element) {
                        values.push(element);
                    }
                }
            }
        }
        Ok(values)
    }

    fn aggregate(
        &self,
        pipeline: &[Document],
        options: &AggregateOptions,
    ) -> DriverResult<Box<dyn Cursor>> {
        debug!(collection = %self.name, stages = pipeline.len(), ?options, "aggregate");
        let mut documents: Vec<Document> = self.readable()?.as_ref().clone();

        for stage in pipeline {
            let mut entries = stage.iter();
            let (name, operand) = match (entries.next(), entries.next()) {
                (Some(entry), None) => entry,
                _ => {
                    return Err(DriverError::operation(
                        BAD_VALUE,
                        "a pipeline stage must have exactly one field",
                    ))
                }
            };
            documents = run_stage(name, operand, documents)?;
        }
        Ok(Box::new(VecCursor::new(documents)))
    }
}

fn run_stage(name: &str, operand: &Value, documents: Vec<Document>) -> DriverResult<Vec<Document>> {
    let object = || {
        operand
            .as_object()
            .ok_or_else(|| DriverError::operation(BAD_VALUE, format!("{} needs a document", name)))
    };
    let count = || {
        operand
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                DriverError::operation(BAD_VALUE, format!("{} needs a non-negative integer", name))
            })
    };

    match name {
        "$match" => {
            let matcher = Matcher::compile(object()?)?;
            Ok(documents.into_iter().filter(|d| matcher.matches(d)).collect())
        }
        "$project" => {
            let fields = object()?;
            Ok(documents.iter().map(|d| projection::apply(d, fields)).collect())
        }
        "$skip" => Ok(documents.into_iter().skip(count()?).collect()),
        "$limit" => Ok(documents.into_iter().take(count()?).collect()),
        "$count" => {
            let field = operand.as_str().filter(|s| !s.is_empty()).ok_or_else(|| {
                DriverError::operation(BAD_VALUE, "$count needs a field name")
            })?;
            if documents.is_empty() {
                return Ok(Vec::new());
            }
            let mut out = Document::new();
            out.insert(field.to_string(), Value::from(documents.len()));
            Ok(vec![out])
        }
        other => {
            warn!(stage = other, "unrecognized pipeline stage");
            Err(DriverError::operation(
                UNRECOGNIZED_STAGE,
                format!("Unrecognized pipeline stage name: '{}'", other),
            ))
        }
    }
}

/// Lazy cursor over a collection snapshot
struct MemoryCursor {
    documents: Arc<Vec<Document>>,
    position: usize,
    matcher: Matcher,
    projection: Option<Document>,
    /// Returned on the first pull, as a server does for a forbidden find
    failure: Option<DriverError>,
    closed: bool,
}

impl Cursor for MemoryCursor {
    fn next_document(&mut self) -> DriverResult<Option<Document>> {
        if let Some(err) = self.failure.take() {
            self.closed = true;
            return Err(err);
        }
        if self.closed {
            return Ok(None);
        }
        while let Some(doc) = self.documents.get(self.position) {
            self.position += 1;
            if self.matcher.matches(doc) {
                let doc = match &self.projection {
                    Some(projection) => projection::apply(doc, projection),
                    None => doc.clone(),
                };
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Cursor over precomputed documents
pub(crate) struct VecCursor {
    documents: std::vec::IntoIter<Document>,
    closed: bool,
}

impl VecCursor {
    pub(crate) fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: documents.into_iter(),
            closed: false,
        }
    }
}

impl Cursor for VecCursor {
    fn next_document(&mut self) -> DriverResult<Option<Document>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.documents.next())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn as_document(value: Value) -> Result<Document, String> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", other)),
    }
}

fn parse_json_array(content: &str) -> Result<Vec<Document>, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    match value {
        Value::Array(items) => items.into_iter().map(as_document).collect(),
        other => Err(format!("expected a JSON array, got {}", other)),
    }
}

fn parse_json_lines(content: &str) -> Result<Vec<Document>, String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
            as_document(value)
        })
        .collect()
}
