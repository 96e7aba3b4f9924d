//! Contract store error types.

use thiserror::Error;

/// Contract store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Domain(#[from] versync_core::Error),
}

impl StoreError {
    /// True for connection-level failures (as opposed to query or data errors).
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            StoreError::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ) | StoreError::Io(_)
        )
    }
}

/// Result type for contract store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_classified() {
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_connection());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_connection());
        assert!(!StoreError::Config("sqlite".to_string()).is_connection());
    }
}
