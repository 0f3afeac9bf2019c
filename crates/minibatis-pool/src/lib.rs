//! # minibatis-pool
//!
//! Bounded connection pool with explicit per-context affinity.
//!
//! The pool keeps an idle queue and an active set of physical connections,
//! enforces a hard `max_active` admission limit and hands out
//! [`PooledConnection`] handles whose `close` returns the connection to the
//! idle queue instead of disconnecting it.
//!
//! ## Features
//!
//! - Eager creation of `initial_size` connections at construction
//! - Affinity: repeated acquires with the same [`ContextId`] observe the
//!   same physical connection until it is released
//! - Timed acquisition that cancels the wait at the deadline
//! - Opportunistic background top-up when the idle queue dips to `min_idle`
//! - Autocommit reset before a connection re-enters the idle queue
//!
//! ## Example
//!
//! ```rust,ignore
//! use minibatis_pool::{ContextId, Pool, PoolConfig};
//!
//! let config = PoolConfig::new()
//!     .initial_size(5)
//!     .min_idle(2)
//!     .max_active(20)
//!     .max_wait(Duration::from_millis(500));
//!
//! let pool = Pool::new(manager, config).await?;
//! let ctx = ContextId::new();
//!
//! let conn = pool.get(&ctx).await?;
//! let again = pool.get(&ctx).await?;
//! assert!(conn.same_connection(&again));
//!
//! // Returns the connection to the idle queue
//! conn.close().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::PoolConfig;
pub use context::ContextId;
pub use error::PoolError;
pub use lifecycle::{ConnectionLifecycle, ConnectionManager, ConnectionMetadata, ConnectionState};
pub use pool::{ConnectionGuard, Pool, PoolBuilder, PoolStatus, PooledConnection};
