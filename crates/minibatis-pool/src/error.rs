//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a [`ConnectionManager`](crate::ConnectionManager).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// No connection could be obtained before the deadline.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(Duration),

    /// Admission refused because `max_active` connections are checked out.
    #[error("maximum active connections ({max}) reached")]
    CapacityExceeded {
        /// Configured `max_active`.
        max: u32,
    },

    /// The idle queue dipped to `min_idle`.
    ///
    /// Only ever rendered into the pool's log output; acquire never returns it.
    #[error("minimum idle connections reached ({idle} idle, min {min_idle})")]
    MinIdleReached {
        /// Idle connections observed.
        idle: usize,
        /// Configured `min_idle`.
        min_idle: u32,
    },

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Opening a physical connection failed.
    #[error("failed to create connection: {0}")]
    ConnectionCreation(#[source] BoxError),

    /// Restoring autocommit on return failed; the connection was discarded.
    #[error("connection reset failed: {0}")]
    ResetFailed(String),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// The handle's lease has already been returned to the pool.
    #[error("connection has been released to the pool")]
    Released,
}

impl PoolError {
    /// Whether the caller failed to obtain a connection in time.
    ///
    /// True for both a plain timeout and a capacity refusal.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionTimeout(_) | Self::CapacityExceeded { .. }
        )
    }

    /// Whether retrying the acquire later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_timeout() || matches!(self, Self::ConnectionCreation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_distinct_from_timeout() {
        let capacity = PoolError::CapacityExceeded { max: 3 };
        let timeout = PoolError::AcquisitionTimeout(Duration::from_millis(10));

        assert!(capacity.is_timeout());
        assert!(timeout.is_timeout());
        assert!(matches!(capacity, PoolError::CapacityExceeded { max: 3 }));
        assert_ne!(capacity.to_string(), timeout.to_string());
    }

    #[test]
    fn test_closed_is_not_retryable() {
        assert!(!PoolError::PoolClosed.is_retryable());
        assert!(!PoolError::Released.is_timeout());
    }
}
