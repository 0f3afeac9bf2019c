//! Transaction context of one session.
//!
//! A [`TransactionContext`] owns at most one pooled connection, taken from
//! the pool the first time a statement needs it. The autocommit mode chosen
//! at construction is applied to the physical connection at that point.
//! Commit and rollback go straight to the driver and their failures are
//! propagated, never retried.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut tx = TransactionContext::new(pool, ContextId::new(), false);
//!
//! let conn = tx.connection().await?;
//! conn.lock().await?.execute("update t_user set name = ? where id = ?", &params).await?;
//!
//! tx.commit().await?;
//! tx.close().await?;
//! ```

use minibatis_pool::{ContextId, Pool, PooledConnection};
use tracing::Instrument;

use crate::driver::DriverManager;
use crate::error::{Error, Result};
use crate::instrumentation;

/// A pooled connection as handed to sessions.
pub type SessionConnection = PooledConnection<DriverManager>;

/// Lazily opened connection plus its transaction mode.
pub struct TransactionContext {
    pool: Pool<DriverManager>,
    context: ContextId,
    auto_commit: bool,
    connection: Option<SessionConnection>,
}

impl TransactionContext {
    /// Create a context. No connection is taken until [`connection`](Self::connection).
    #[must_use]
    pub fn new(pool: Pool<DriverManager>, context: ContextId, auto_commit: bool) -> Self {
        Self {
            pool,
            context,
            auto_commit,
            connection: None,
        }
    }

    /// The connection of this context, opening it on first call.
    ///
    /// Repeated calls return the same connection until [`close`](Self::close).
    /// If another session in the same context released the checkout in the
    /// meantime, a fresh connection is taken.
    pub async fn connection(&mut self) -> Result<&SessionConnection> {
        if let Some(conn) = self.connection.take_if(|conn| conn.is_released()) {
            tracing::debug!(
                connection_id = conn.id(),
                context = %self.context,
                "held connection was released by another session; reacquiring"
            );
        }

        if self.connection.is_none() {
            // A context that is already bound belongs to a peer session too.
            let shared = self.pool.is_bound(&self.context);
            let conn = self.pool.get(&self.context).await?;

            if let Err(e) = apply_auto_commit(&conn, self.auto_commit).await {
                tracing::warn!(
                    connection_id = conn.id(),
                    error = %e,
                    shared,
                    "could not apply autocommit mode"
                );
                if !shared {
                    if let Err(release) = self.pool.release(&conn).await {
                        tracing::debug!(error = %release, "release after failed open");
                    }
                }
                return Err(e);
            }

            tracing::trace!(
                connection_id = conn.id(),
                context = %self.context,
                auto_commit = self.auto_commit,
                "transaction context opened"
            );
            self.connection = Some(conn);
        }

        self.connection.as_ref().ok_or(Error::NoConnection)
    }

    /// Commit the current transaction.
    ///
    /// Fails with [`Error::NoConnection`] if no connection was ever opened.
    pub async fn commit(&mut self) -> Result<()> {
        self.finish(true).await
    }

    /// Roll back the current transaction.
    ///
    /// Fails with [`Error::NoConnection`] if no connection was ever opened.
    pub async fn rollback(&mut self) -> Result<()> {
        self.finish(false).await
    }

    async fn finish(&mut self, commit: bool) -> Result<()> {
        let conn = self.connection.as_ref().ok_or(Error::NoConnection)?;
        let span = instrumentation::transaction_span(commit);

        async {
            let mut guard = conn.lock().await?;
            if commit {
                guard.commit().await?;
            } else {
                guard.rollback().await?;
            }
            Ok::<_, Error>(())
        }
        .instrument(span.clone())
        .await
        .inspect_err(|e| instrumentation::record_error(&span, e))
    }

    /// Release the connection back to the pool and forget it.
    ///
    /// A context without an open connection closes trivially.
    pub async fn close(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(conn) => {
                tracing::trace!(connection_id = conn.id(), "transaction context closing");
                self.pool.release(&conn).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Change the autocommit mode, applying it at once if a connection is open.
    pub async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.auto_commit = auto_commit;
        if let Some(conn) = &self.connection {
            apply_auto_commit(conn, auto_commit).await?;
        }
        Ok(())
    }

    /// The autocommit mode new connections are opened with.
    #[must_use]
    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Whether a connection is currently held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// The context token connections are bound to.
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// The pool connections come from.
    #[must_use]
    pub fn pool(&self) -> &Pool<DriverManager> {
        &self.pool
    }

    /// Take the held connection without releasing it.
    pub(crate) fn take_connection(&mut self) -> Option<SessionConnection> {
        self.connection.take()
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("context", &self.context)
            .field("auto_commit", &self.auto_commit)
            .field("connection", &self.connection.as_ref().map(SessionConnection::id))
            .finish()
    }
}

async fn apply_auto_commit(conn: &SessionConnection, auto_commit: bool) -> Result<()> {
    let mut guard = conn.lock().await?;
    if guard.auto_commit() != auto_commit {
        guard.set_auto_commit(auto_commit).await?;
    }
    Ok(())
}
