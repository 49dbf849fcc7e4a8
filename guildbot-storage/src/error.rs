use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to open database connection: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Timed out opening database connection after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Timed out waiting for a database connection after {0:?}")]
    QueueTimeout(Duration),

    #[error("Connection pool is closed")]
    Closed,

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Unknown query method: {0} (expected run, get or all)")]
    InvalidMethod(String),
}

impl PoolError {
    /// Whether the error came from waiting too long for a free connection.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::QueueTimeout(_) | PoolError::ConnectTimeout(_))
    }
}
