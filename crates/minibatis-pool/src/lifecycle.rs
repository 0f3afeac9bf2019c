//! Connection lifecycle management.
//!
//! This module defines the seams between the pool and the physical
//! connections it manages: a [`ConnectionManager`] opens connections, and
//! each connection implements [`ConnectionLifecycle`] so the pool can restore
//! it to a clean state before it re-enters the idle queue.

use std::time::Instant;

use crate::error::PoolError;

/// Opens physical connections on behalf of the pool.
///
/// Object-safe via `#[async_trait]` so the returned futures are `Send` and
/// can run inside the pool's background top-up task.
#[async_trait::async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    /// The physical connection type.
    type Connection: ConnectionLifecycle;

    /// Error produced when a connection cannot be opened.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new physical connection.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;
}

/// Operations the pool performs on a connection around checkout.
#[async_trait::async_trait]
pub trait ConnectionLifecycle: Send + 'static {
    /// Reset connection state for pool return.
    ///
    /// Must leave the connection in autocommit mode with no open
    /// transaction. A failure causes the pool to discard the connection.
    async fn reset(&mut self) -> Result<(), PoolError>;

    /// Physically disconnect. Called when the pool discards or closes.
    async fn close(&mut self) {}
}

/// Connection state tracked by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is idle and available for use.
    Idle,
    /// Connection is bound to a context.
    InUse,
    /// Connection is being reset on its way back to idle.
    Resetting,
    /// Connection has been discarded.
    Closed,
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection within its pool.
    pub id: u64,
    /// When the connection was opened.
    pub created_at: Instant,
    /// When the connection was last checked out or returned.
    pub last_used_at: Instant,
    /// Number of times the connection has been checked out.
    pub checkout_count: u64,
    /// Current state of the connection.
    pub state: ConnectionState,
}

impl ConnectionMetadata {
    /// Create metadata for a freshly opened connection.
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used_at: now,
            checkout_count: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Mark the connection as checked out.
    pub fn mark_checkout(&mut self) {
        self.last_used_at = Instant::now();
        self.checkout_count += 1;
        self.state = ConnectionState::InUse;
    }

    /// Mark the connection as being reset.
    pub fn mark_resetting(&mut self) {
        self.state = ConnectionState::Resetting;
    }

    /// Mark the connection as returned to idle.
    pub fn mark_checkin(&mut self) {
        self.last_used_at = Instant::now();
        self.state = ConnectionState::Idle;
    }

    /// Mark the connection as discarded.
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }
}
