//! Error types for the SQLite storage implementation.

/// Error type for opening and migrating the SQLite graph database.
///
/// Errors raised by the [`GraphStorage`](contactfeed_storage_traits::GraphStorage) methods
/// themselves are reported as
/// [`GraphStorageError`](contactfeed_storage_traits::GraphStorageError).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// SQLite database error
    #[error("Database error: {0}")]
    Database(String),
    /// Error from rusqlite
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    /// Error during database migration
    #[error("Migration error: {0}")]
    Refinery(#[from] refinery::Error),
    /// Filesystem error while preparing the database location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for contactfeed_storage_traits::GraphStorageError {
    fn from(error: Error) -> Self {
        Self::Database(error.to_string())
    }
}
