//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur while converting between [`SqlValue`](crate::SqlValue)
/// and Rust types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// Value is NULL but the target type cannot represent NULL.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// The value's kind does not convert to the target type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual SQL type name.
        actual: &'static str,
    },

    /// Value does not fit in the target type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// The requested column is not part of the row.
    #[error("column not found: {0}")]
    ColumnNotFound(String),
}

impl TypeError {
    pub(crate) fn mismatch(expected: &'static str, value: &crate::SqlValue) -> Self {
        Self::TypeMismatch {
            expected,
            actual: value.type_name(),
        }
    }
}
