//! Session lifecycle state.
//!
//! ## State Transitions
//!
//! ```text
//! Unopened -> Connected (first CRUD call or connect())
//! Connected -> Closed (close())
//! Unopened -> Closed (close() before any statement)
//! ```
//!
//! `Closed` is terminal; CRUD calls in that state fail with
//! [`Error::SessionClosed`](crate::Error::SessionClosed).

use std::fmt;

/// Runtime state of a [`SqlSession`](crate::SqlSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection has been taken from the pool yet.
    #[default]
    Unopened,
    /// A pooled connection is bound to the session's context.
    Connected,
    /// The session was closed; its connection went back to the pool.
    Closed,
}

impl SessionState {
    /// Check if statements can still be issued.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Check if a connection is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unopened => "UNOPENED",
            Self::Connected => "CONNECTED",
            Self::Closed => "CLOSED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::default().is_usable());
        assert!(!SessionState::Unopened.is_connected());
        assert!(SessionState::Connected.is_connected());
        assert!(!SessionState::Closed.is_usable());
        assert_eq!(SessionState::Closed.to_string(), "CLOSED");
    }
}
