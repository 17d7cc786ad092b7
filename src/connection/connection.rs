//! Connection to one database and the extraction operations on it

use std::fmt;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, error, info};

use super::credentials::{default_credentials_path, load_target, ConnectionTarget};
use crate::driver::{
    AggregateOptions, Cursor, Database, Document, Driver, DriverError, DriverResult,
};
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::result::{ResultStream, StreamHandle};

/// Which collections an extraction runs over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CollectionScope {
    /// Every collection the database lists
    #[default]
    All,
    /// These collections, in this order
    Only(Vec<String>),
}

impl CollectionScope {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CollectionScope::Only(names.into_iter().map(Into::into).collect())
    }
}

/// An open connection to one database.
///
/// Every [`ResultStream`] produced by [`Connection::extract`] or
/// [`Connection::aggregate`] is registered here and closed together with the
/// connection, so no cursor outlives it.
///
/// ```
/// use querier::{Connection, ConnectionTarget, Filter};
/// use querier::memory::{MemoryDatabase, MemoryDriver};
/// use serde_json::json;
///
/// let db = MemoryDatabase::new();
/// let tweets = vec![json!({"lang": "es"}), json!({"lang": "en"})];
/// db.insert_many("spain", tweets.into_iter().filter_map(|v| v.as_object().cloned()))
///     .unwrap();
/// let driver = MemoryDriver::new().with_database("twitter", db).unwrap();
///
/// let target = ConnectionTarget {
///     database: "twitter".into(),
///     host: "localhost".into(),
///     port: 27017,
///     user: "reader".into(),
///     password: "secret".into(),
/// };
/// let mut con = Connection::connect(&driver, &target).unwrap();
///
/// let mut f = Filter::new();
/// f.equals("lang", "es").unwrap();
/// assert_eq!(con.count_entries(Some(&f), None).unwrap(), 1);
/// con.close();
/// ```
pub struct Connection {
    database: Box<dyn Database>,
    name: String,
    streams: Vec<StreamHandle>,
    closed: bool,
}

impl Connection {
    /// Resolves `database` in the credentials file, connects and pings
    pub fn open(
        driver: &dyn Driver,
        database: &str,
        credentials_path: impl AsRef<Path>,
    ) -> QueryResult<Self> {
        let target = load_target(database, credentials_path.as_ref())?;
        Self::connect(driver, &target)
    }

    /// [`Connection::open`] with `~/.credentials.toml`
    pub fn open_default(driver: &dyn Driver, database: &str) -> QueryResult<Self> {
        let path = default_credentials_path()?;
        Self::open(driver, database, path)
    }

    /// Connects to an already resolved target and pings it
    pub fn connect(driver: &dyn Driver, target: &ConnectionTarget) -> QueryResult<Self> {
        let database = driver
            .connect(target)
            .map_err(|err| ping_error(&target.database, err))?;

        info!(
            database = %target.database,
            host = %target.host,
            port = target.port,
            pid = std::process::id(),
            "started connection"
        );

        let connection = Self {
            database,
            name: target.database.clone(),
            streams: Vec::new(),
            closed: false,
        };
        connection.test_connection()?;
        Ok(connection)
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once [`Connection::close`] ran
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pings the server, mapping failures to user-facing errors
    pub fn test_connection(&self) -> QueryResult<()> {
        self.ensure_open()?;
        self.database
            .ping()
            .map_err(|err| ping_error(&self.name, err))
    }

    /// Counts matching documents in one collection, or across every available
    /// collection when `collection` is `None`.
    ///
    /// An empty filter uses the collection metadata count.
    pub fn count_entries(&self, filter: Option<&Filter>, collection: Option<&str>) -> QueryResult<u64> {
        self.ensure_open()?;
        let query = query_of(filter);
        let names = match collection {
            Some(name) => vec![name.to_string()],
            None => self.list_available_collections()?,
        };

        let mut total = 0;
        for name in names {
            let coll = self.database.collection(&name);
            let counted = if query.is_empty() {
                coll.estimated_document_count()
            } else {
                coll.count_documents(&query)
            };
            if let Some(n) = recover(counted, &name)? {
                total += n;
            }
        }
        Ok(total)
    }

    /// Opens one cursor per collection in `scope` and merges them into a
    /// stream. `fields` restricts the returned fields; empty means all.
    pub fn extract(
        &mut self,
        filter: Option<&Filter>,
        fields: &[&str],
        scope: CollectionScope,
    ) -> QueryResult<ResultStream> {
        self.ensure_open()?;
        let query = query_of(filter);
        let projection = projection_of(fields);
        let shown = Value::Object(query.clone());
        debug!(database = %self.name, query = %shown, "begin extraction");

        let names = self.scope_names(scope)?;
        let sources = open_cursors(names, |name| {
            debug!(collection = %name, "extract in collection");
            self.database.collection(name).find(&query, projection.as_ref())
        })?;
        Ok(self.register(sources))
    }

    /// First document matching `filter`, searching collections in order
    pub fn extract_one(
        &self,
        filter: Option<&Filter>,
        scope: CollectionScope,
    ) -> QueryResult<Option<Document>> {
        self.ensure_open()?;
        let query = query_of(filter);
        let shown = Value::Object(query.clone());
        debug!(database = %self.name, query = %shown, "begin extract one");

        for name in self.scope_names(scope)? {
            let found = recover(self.database.collection(&name).find_one(&query), &name)?;
            if let Some(doc) = found.flatten() {
                info!(collection = %name, "found in collection");
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Runs `pipeline` on every collection in `scope` and merges the outputs
    pub fn aggregate(
        &mut self,
        pipeline: &[Document],
        options: &AggregateOptions,
        scope: CollectionScope,
    ) -> QueryResult<ResultStream> {
        self.ensure_open()?;
        debug!(database = %self.name, stages = pipeline.len(), "begin aggregation");

        let names = self.scope_names(scope)?;
        let sources = open_cursors(names, |name| {
            self.database.collection(name).aggregate(pipeline, options)
        })?;
        Ok(self.register(sources))
    }

    /// Every value `field` takes across all collections, without duplicates,
    /// in first-seen order
    pub fn distinct(&self, field: &str) -> QueryResult<Vec<Value>> {
        self.ensure_open()?;
        debug!(database = %self.name, field, "begin distinct");

        let mut values: Vec<Value> = Vec::new();
        for name in self.all_collection_names()? {
            let found = recover(self.database.collection(&name).distinct(field), &name)?;
            for value in found.into_iter().flatten() {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            debug!(collection = %name, "executed distinct");
        }
        Ok(values)
    }

    /// Collection names, without system collections
    pub fn list_available_collections(&self) -> QueryResult<Vec<String>> {
        let mut names = self.all_collection_names()?;
        names.retain(|name| !name.contains("system"));
        Ok(names)
    }

    /// Closes every stream still alive, then the database client.
    ///
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for stream in self.streams.drain(..) {
            stream.close();
        }
        debug!(database = %self.name, "closing connection");
        self.database.close();
        self.closed = true;
    }

    fn ensure_open(&self) -> QueryResult<()> {
        if self.closed {
            Err(QueryError::Closed)
        } else {
            Ok(())
        }
    }

    fn all_collection_names(&self) -> QueryResult<Vec<String>> {
        self.ensure_open()?;
        self.database
            .list_collection_names()
            .map_err(|err| internal(&self.name, err))
    }

    fn scope_names(&self, scope: CollectionScope) -> QueryResult<Vec<String>> {
        match scope {
            CollectionScope::All => self.all_collection_names(),
            CollectionScope::Only(names) => Ok(names),
        }
    }

    fn register(&mut self, sources: Vec<(String, Box<dyn Cursor>)>) -> ResultStream {
        let mut stream = ResultStream::new();
        stream.attach(sources);
        self.streams.retain(StreamHandle::is_alive);
        self.streams.push(stream.handle());
        stream
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("streams", &self.streams.len())
            .field("closed", &self.closed)
            .finish()
    }
}

fn query_of(filter: Option<&Filter>) -> Document {
    filter.map(Filter::get_query).unwrap_or_default()
}

/// `{field: 1, ...}`, or `None` for no restriction
pub(crate) fn projection_of(fields: &[&str]) -> Option<Document> {
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .map(|field| (field.to_string(), Value::from(1)))
            .collect(),
    )
}

/// Skips a collection that denies the command; anything else is fatal
fn recover<T>(result: DriverResult<T>, collection: &str) -> QueryResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_unauthorized() => {
            debug!(collection, "collection not authorized, skipped");
            Ok(None)
        }
        Err(err) => Err(internal(collection, err)),
    }
}

/// Opens one cursor per collection. Denied collections are skipped; on any
/// other error the cursors opened so far are closed before returning.
fn open_cursors<F>(names: Vec<String>, mut open: F) -> QueryResult<Vec<(String, Box<dyn Cursor>)>>
where
    F: FnMut(&str) -> DriverResult<Box<dyn Cursor>>,
{
    let mut sources: Vec<(String, Box<dyn Cursor>)> = Vec::new();
    for name in names {
        match recover(open(&name), &name) {
            Ok(Some(cursor)) => sources.push((name, cursor)),
            Ok(None) => {}
            Err(err) => {
                for (_, mut cursor) in sources {
                    cursor.close();
                }
                return Err(err);
            }
        }
    }
    Ok(sources)
}

fn internal(context: &str, err: DriverError) -> QueryError {
    error!(context, error = %err, "unhandled driver error");
    QueryError::Internal(err)
}

fn ping_error(database: &str, err: DriverError) -> QueryError {
    let base = format!("Error accessing the database '{}'.", database);
    match err {
        err if err.is_authentication_failure() => QueryError::Authentication(format!(
            "{} Credentials are wrong or the user does not have sufficient permissions.",
            base
        )),
        DriverError::ServerSelection(_) => QueryError::Server(format!(
            "{} No server is available at the host or port found in the credentials file.",
            base
        )),
        DriverError::ConnectionFailure(reason) => QueryError::Server(format!(
            "{} The connection to the database failed: {}",
            base, reason
        )),
        other => internal(database, other),
    }
}
