//! SQLite-based storage implementation for the contactfeed social graph.
//!
//! Implements [`GraphStorage`](contactfeed_storage_traits::GraphStorage) on top of a single
//! rusqlite connection. Schema changes are shipped as embedded refinery migrations and applied
//! on open. Every contact delta runs inside one `IMMEDIATE` transaction, so a failed commit
//! leaves the stored graph untouched.
//!
//! ```no_run
//! use contactfeed_sqlite_storage::ContactfeedSqliteStorage;
//!
//! let storage = ContactfeedSqliteStorage::new("/path/to/graph.db")?;
//! # Ok::<(), contactfeed_sqlite_storage::error::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use contactfeed_storage_traits::{DEFAULT_MAX_CONTACTS_PER_USER, GraphStorageError};
use rusqlite::Connection;

mod db;
pub mod error;
mod graph;
mod migrations;

use self::error::Error;

/// A SQLite-based storage implementation for the social graph.
///
/// The connection is shared behind a mutex; every trait method holds it for the duration
/// of one logical operation.
#[derive(Clone)]
pub struct ContactfeedSqliteStorage {
    connection: Arc<Mutex<Connection>>,
    max_contacts_per_user: usize,
}

impl std::fmt::Debug for ContactfeedSqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactfeedSqliteStorage")
            .field("max_contacts_per_user", &self.max_contacts_per_user)
            .finish_non_exhaustive()
    }
}

impl ContactfeedSqliteStorage {
    /// Opens (or creates) the graph database at `file_path` and applies pending migrations.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created, or a migration fails.
    pub fn new<P>(file_path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let file_path = file_path.as_ref();
        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let connection = Self::open_connection(file_path)?;
        Self::from_connection(connection)
    }

    /// Creates a new in-memory [`ContactfeedSqliteStorage`].
    ///
    /// In-memory databases do not persist data; useful for tests exercising the SQL paths.
    pub fn new_in_memory() -> Result<Self, Error> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(connection)
    }

    fn open_connection(file_path: &Path) -> Result<Connection, Error> {
        let conn = Connection::open(file_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, Error> {
        migrations::run_migrations(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            max_contacts_per_user: DEFAULT_MAX_CONTACTS_PER_USER,
        })
    }

    /// Sets the maximum number of contact edges a single user may own.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn with_max_contacts_per_user(mut self, limit: usize) -> Self {
        assert!(limit > 0, "max_contacts_per_user must be greater than 0");
        self.max_contacts_per_user = limit;
        self
    }

    /// Maximum number of contact edges a single user may own
    pub fn max_contacts_per_user(&self) -> usize {
        self.max_contacts_per_user
    }

    /// Runs `f` with exclusive access to the connection.
    pub(crate) fn with_connection<F, T>(&self, f: F) -> Result<T, GraphStorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, GraphStorageError>,
    {
        let mut conn = self
            .connection
            .lock()
            .map_err(|_| GraphStorageError::Database("connection mutex poisoned".to_string()))?;
        f(&mut conn)
    }
}
