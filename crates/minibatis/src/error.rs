//! Session layer error types.

use minibatis_pool::PoolError;
use minibatis_types::TypeError;
use thiserror::Error;

use crate::driver::DriverError;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool could not hand out a connection.
    #[error("pool error: {0}")]
    Pool(PoolError),

    /// Error reported by the underlying driver, passed through unmodified.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Value conversion failed while binding or mapping.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// A placeholder names a field or key the parameter source lacks.
    #[error("no value for placeholder #{{{name}}} in statement {statement}")]
    Binding {
        /// Placeholder name.
        name: String,
        /// Mapping id of the statement being bound.
        statement: String,
    },

    /// No mapping entry is registered under this id.
    #[error("statement not found: {0}")]
    StatementNotFound(String),

    /// `select_one` matched more than one row.
    #[error("expected at most one row from {id}, got {count}")]
    NonUniqueResult {
        /// Mapping id.
        id: String,
        /// Number of rows returned.
        count: usize,
    },

    /// The session has been closed.
    #[error("session is closed")]
    SessionClosed,

    /// Commit or rollback was requested before any connection was opened.
    #[error("no connection has been opened in this transaction context")]
    NoConnection,

    /// A template placeholder name is empty or uses illegal characters.
    #[error("invalid placeholder #{{{name}}} in statement {statement}")]
    InvalidPlaceholder {
        /// The offending placeholder text.
        name: String,
        /// Mapping id of the template.
        statement: String,
    },

    /// The mapping entry declares a result type other than the requested one.
    #[error("statement {id} declares result type {declared}, requested {requested}")]
    ResultTypeMismatch {
        /// Mapping id.
        id: String,
        /// Result type declared by the mapping entry.
        declared: String,
        /// Rust entity type requested by the caller.
        requested: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external mapping source failed to load a namespace.
    #[error("mapping source error: {0}")]
    MappingSource(String),
}

impl From<PoolError> for Error {
    /// Connection failures keep the driver's own error.
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ConnectionCreation(source) => match source.downcast::<DriverError>() {
                Ok(driver) => Self::Driver(*driver),
                Err(other) => Self::Pool(PoolError::ConnectionCreation(other)),
            },
            other => Self::Pool(other),
        }
    }
}

impl Error {
    /// Check if this error means no connection could be obtained in time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Pool(e) if e.is_timeout())
    }

    /// Check if this error is transient and may succeed on retry.
    ///
    /// This layer never retries by itself; the classification is for callers.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(e) => e.is_retryable(),
            Self::Driver(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Check if this error came from the underlying driver.
    #[must_use]
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    pub(crate) fn binding(name: &str, statement: &str) -> Self {
        Self::Binding {
            name: name.to_owned(),
            statement: statement.to_owned(),
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
