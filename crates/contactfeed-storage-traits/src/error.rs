//! Error types for graph storage operations

use thiserror::Error;

/// Error type for graph storage operations.
///
/// Returned by every [`GraphStorage`](crate::GraphStorage) method, regardless of backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphStorageError {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(String),

    /// The caller supplied an inconsistent request
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Requested item was not found
    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_storage_error_display() {
        let err = GraphStorageError::Database("connection failed".to_string());
        assert_eq!(err.to_string(), "database error: connection failed");

        let err = GraphStorageError::InvalidParameters("overlap".to_string());
        assert_eq!(err.to_string(), "invalid parameters: overlap");

        let err = GraphStorageError::NotFound("user".to_string());
        assert_eq!(err.to_string(), "not found: user");
    }

    #[test]
    fn test_graph_storage_error_is_error() {
        let err: Box<dyn std::error::Error> =
            Box::new(GraphStorageError::Database("test".to_string()));
        assert!(err.to_string().contains("database error"));
    }
}
