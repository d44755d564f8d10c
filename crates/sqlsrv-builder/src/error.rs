//! Error types for sqlsrv-builder

use thiserror::Error;

/// Result type alias for builder operations
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Boxed error produced by a database collaborator.
pub type DbError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for statement compilation and execution
#[derive(Debug, Error)]
pub enum BuilderError {
    /// The builder was used in a way that cannot produce a valid statement
    /// (DELETE without WHERE, INSERT without SET, ...).
    #[error("Usage error: {0}")]
    Usage(String),

    /// Failure reported by the database collaborator, passed through unchanged.
    #[error("Database error: {0}")]
    Database(#[source] DbError),

    /// A query hook refused to let the statement run.
    #[error("Query aborted by hook: {0}")]
    Aborted(String),

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl BuilderError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Wrap a collaborator error
    pub fn database(err: impl Into<DbError>) -> Self {
        Self::Database(err.into())
    }

    /// Check if this is a usage error
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Check if this error came from the database collaborator
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<toml::de::Error> for BuilderError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
