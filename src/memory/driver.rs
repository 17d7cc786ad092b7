//! In-memory driver: a registry of named databases

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::database::MemoryDatabase;
use crate::connection::ConnectionTarget;
use crate::driver::{Database, Driver, DriverError, DriverResult};

/// Driver serving [`MemoryDatabase`]s by name.
///
/// Connecting to a name that was never registered yields a fresh empty
/// database, which is then kept for later connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    databases: Arc<RwLock<HashMap<String, MemoryDatabase>>>,
    offline: bool,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose connections never reach a server
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Registers `database` under `name`, replacing any previous one
    pub fn with_database(self, name: &str, database: MemoryDatabase) -> DriverResult<Self> {
        self.databases
            .write()
            .map_err(|_| DriverError::Other("driver registry lock poisoned".to_string()))?
            .insert(name.to_string(), database);
        Ok(self)
    }

    /// Returns the database registered under `name`, creating it if needed
    pub fn database(&self, name: &str) -> DriverResult<MemoryDatabase> {
        let mut databases = self
            .databases
            .write()
            .map_err(|_| DriverError::Other("driver registry lock poisoned".to_string()))?;
        Ok(databases.entry(name.to_string()).or_default().clone())
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, target: &ConnectionTarget) -> DriverResult<Box<dyn Database>> {
        debug!(database = %target.database, host = %target.host, port = target.port, "memory connect");
        let database = self.database(&target.database)?;
        let credentials = Some((target.user.clone(), target.password.clone()));
        Ok(Box::new(database.session(credentials, self.offline)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(database: &str, password: &str) -> ConnectionTarget {
        ConnectionTarget {
            database: database.to_string(),
            host: "localhost".to_string(),
            port: 27017,
            user: "reader".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_connect_registered_database() {
        let db = MemoryDatabase::new();
        db.insert_many("c", vec![serde_json::Map::new()]).unwrap();
        let driver = MemoryDriver::new().with_database("twitter", db).unwrap();

        let conn = driver.connect(&target("twitter", "x")).unwrap();
        assert!(conn.ping().is_ok());
        assert_eq!(conn.list_collection_names().unwrap(), vec!["c"]);
    }

    #[test]
    fn test_unknown_database_is_empty() {
        let driver = MemoryDriver::new();
        let conn = driver.connect(&target("nothing", "x")).unwrap();
        assert!(conn.list_collection_names().unwrap().is_empty());
    }

    #[test]
    fn test_credentials_checked_on_ping() {
        let db = MemoryDatabase::new();
        db.require_credentials("reader", "secret").unwrap();
        let driver = MemoryDriver::new().with_database("twitter", db).unwrap();

        assert!(driver.connect(&target("twitter", "secret")).unwrap().ping().is_ok());
        let err = driver.connect(&target("twitter", "nope")).unwrap().ping().unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_offline_driver() {
        let conn = MemoryDriver::offline().connect(&target("twitter", "x")).unwrap();
        assert!(matches!(conn.ping(), Err(DriverError::ServerSelection(_))));
    }
}
