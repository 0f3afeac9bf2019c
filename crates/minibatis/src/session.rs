//! The session façade.
//!
//! A [`SqlSession`] runs mapped statements by id. It takes a connection
//! from the pool on the first statement (or on [`SqlSession::connect`]) and
//! keeps it, bound to the session's context, until [`SqlSession::close`].
//!
//! ```rust,ignore
//! let mut session = factory.open_session(false);
//!
//! session.insert("app.dao.UserDao.insert", &user).await?;
//! let found: Option<User> = session
//!     .select_one("app.dao.UserDao.findById", Params::scalar(&1i64)?)
//!     .await?;
//!
//! session.commit().await?;
//! session.close().await?;
//! ```
//!
//! A failed statement leaves the session open; rolling back and closing is
//! up to the caller.

use std::fmt;
use std::sync::Arc;

use minibatis_pool::ContextId;
use tracing::Instrument;

use crate::entity::{Entity, declares_type};
use crate::error::{Error, Result};
use crate::instrumentation::{self, record_error, record_rows};
use crate::params::{Arg, Params};
use crate::result_mapper::ResultMapper;
use crate::state::SessionState;
use crate::statement::{MappingEntry, StatementStore, statement_id};
use crate::transaction::{SessionConnection, TransactionContext};

/// One logical unit of work against a pooled environment.
pub struct SqlSession {
    statements: Arc<StatementStore>,
    transaction: TransactionContext,
    state: SessionState,
}

impl SqlSession {
    /// Create a session over `transaction`, resolving ids in `statements`.
    #[must_use]
    pub fn new(statements: Arc<StatementStore>, transaction: TransactionContext) -> Self {
        Self {
            statements,
            transaction,
            state: SessionState::Unopened,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.state.is_usable()
    }

    /// The context token this session's connection is bound to.
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.transaction.context()
    }

    /// Whether statements run in autocommit mode.
    #[must_use]
    pub fn is_auto_commit(&self) -> bool {
        self.transaction.is_auto_commit()
    }

    /// Switch autocommit mode for this session's connection.
    pub async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.ensure_usable()?;
        self.transaction.set_auto_commit(auto_commit).await
    }

    /// Take the connection now instead of on the first statement.
    pub async fn connect(&mut self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state.is_usable() {
            Ok(())
        } else {
            Err(Error::SessionClosed)
        }
    }

    async fn connection(&mut self) -> Result<&SessionConnection> {
        self.ensure_usable()?;
        let conn = self.transaction.connection().await?;
        if self.state == SessionState::Unopened {
            tracing::debug!(connection_id = conn.id(), "session connected");
            self.state = SessionState::Connected;
        }
        Ok(conn)
    }

    /// Run an insert statement. Same as [`update`](Self::update).
    pub async fn insert<'p>(&mut self, id: &str, params: impl Into<Params<'p>>) -> Result<u64> {
        self.update(id, params).await
    }

    /// Run a delete statement. Same as [`update`](Self::update).
    pub async fn delete<'p>(&mut self, id: &str, params: impl Into<Params<'p>>) -> Result<u64> {
        self.update(id, params).await
    }

    /// Run a data-modifying statement and return the affected row count.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] after [`close`](Self::close)
    /// - [`Error::StatementNotFound`] for an unknown id
    /// - [`Error::Binding`] when a placeholder cannot be resolved
    /// - [`Error::Driver`] for connection or execution failures
    pub async fn update<'p>(&mut self, id: &str, params: impl Into<Params<'p>>) -> Result<u64> {
        let params = params.into();
        self.ensure_usable()?;

        let entry = self.statements.get(id)?;
        let bound = entry.bind(&params)?;
        let span = instrumentation::statement_span(id, bound.sql());

        let conn = self.connection().await?;
        let result = async {
            let mut guard = conn.lock().await?;
            Ok::<_, Error>(guard.execute(bound.sql(), bound.params()).await?)
        }
        .instrument(span.clone())
        .await;

        match &result {
            Ok(rows) => {
                record_rows(&span, *rows);
                tracing::debug!(statement = id, rows, "update executed");
            }
            Err(e) => record_error(&span, e),
        }
        result
    }

    /// Run a query and map every row into `T`.
    ///
    /// Returns an empty vector when nothing matches.
    pub async fn select_list<'p, T: Entity>(
        &mut self,
        id: &str,
        params: impl Into<Params<'p>>,
    ) -> Result<Vec<T>> {
        let params = params.into();
        self.ensure_usable()?;

        let entry = self.statements.get(id)?;
        check_result_type::<T>(&entry)?;
        let bound = entry.bind(&params)?;
        let span = instrumentation::statement_span(id, bound.sql());

        let conn = self.connection().await?;
        let result = async {
            let rows = {
                let mut guard = conn.lock().await?;
                guard.query(bound.sql(), bound.params()).await?
            };
            ResultMapper::materialize::<T, _>(rows)
        }
        .instrument(span.clone())
        .await;

        match &result {
            Ok(items) => {
                record_rows(&span, items.len() as u64);
                tracing::debug!(statement = id, rows = items.len(), "query executed");
            }
            Err(e) => record_error(&span, e),
        }
        result
    }

    /// Run a query expected to match at most one row.
    ///
    /// Fails with [`Error::NonUniqueResult`] when two or more rows match.
    pub async fn select_one<'p, T: Entity>(
        &mut self,
        id: &str,
        params: impl Into<Params<'p>>,
    ) -> Result<Option<T>> {
        let mut items = self.select_list::<T>(id, params).await?;
        match items.len() {
            0 | 1 => Ok(items.pop()),
            count => Err(Error::NonUniqueResult {
                id: id.to_owned(),
                count,
            }),
        }
    }

    /// Commit the current transaction.
    ///
    /// Fails with [`Error::NoConnection`] if no statement has run yet.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.transaction.commit().await
    }

    /// Roll back the current transaction.
    ///
    /// Fails with [`Error::NoConnection`] if no statement has run yet.
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.transaction.rollback().await
    }

    /// Return the connection to the pool. Closing twice is a no-op.
    ///
    /// Uncommitted work is not rolled back here; the pool's reset restores
    /// autocommit, which commits under JDBC semantics.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        tracing::debug!(context = %self.context(), "session closed");
        self.transaction.close().await
    }

    /// Dispatch statements by operation name within `namespace`.
    pub fn mapper(&mut self, namespace: impl Into<String>) -> Mapper<'_> {
        Mapper {
            session: self,
            namespace: namespace.into(),
        }
    }
}

fn check_result_type<T: Entity>(entry: &MappingEntry) -> Result<()> {
    match entry.declared_result_type() {
        Some(declared) if !declares_type::<T>(declared) => Err(Error::ResultTypeMismatch {
            id: entry.id().to_owned(),
            declared: declared.to_owned(),
            requested: T::TYPE_NAME,
        }),
        _ => Ok(()),
    }
}

impl Drop for SqlSession {
    fn drop(&mut self) {
        let Some(conn) = self.transaction.take_connection() else {
            return;
        };

        tracing::warn!(
            context = %self.transaction.context(),
            connection_id = conn.id(),
            "session dropped without close; releasing connection"
        );

        let pool = self.transaction.pool().clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = pool.release(&conn).await {
                        tracing::warn!(error = %e, "release of dropped session failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = conn.id(),
                    "no runtime to release connection; it stays checked out until pool close"
                );
            }
        }
    }
}

impl fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSession")
            .field("state", &self.state)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

/// Operation-name dispatch over one namespace.
///
/// `mapper.update("updateCar", args)` runs `namespace.updateCar`, with the
/// arguments folded into one parameter object by [`Params::from_args`].
///
/// ```rust,ignore
/// let mut dao = session.mapper("app.dao.UserDao");
/// dao.update("updateCar", vec![Arg::named("id", 1i64), Arg::named("oldCar", "BMW")]).await?;
/// let user: Option<User> = dao.select_one("findById", vec![Arg::value(SqlValue::BigInt(1))]).await?;
/// ```
pub struct Mapper<'s> {
    session: &'s mut SqlSession,
    namespace: String,
}

impl Mapper<'_> {
    /// The namespace operations resolve in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run `namespace.operation` as an insert.
    pub async fn insert(&mut self, operation: &str, args: Vec<Arg<'_>>) -> Result<u64> {
        self.update(operation, args).await
    }

    /// Run `namespace.operation` as a delete.
    pub async fn delete(&mut self, operation: &str, args: Vec<Arg<'_>>) -> Result<u64> {
        self.update(operation, args).await
    }

    /// Run `namespace.operation` as an update.
    pub async fn update(&mut self, operation: &str, args: Vec<Arg<'_>>) -> Result<u64> {
        let id = statement_id(&self.namespace, operation);
        self.session.update(&id, Params::from_args(args)).await
    }

    /// Run `namespace.operation` as a list query.
    pub async fn select_list<T: Entity>(
        &mut self,
        operation: &str,
        args: Vec<Arg<'_>>,
    ) -> Result<Vec<T>> {
        let id = statement_id(&self.namespace, operation);
        self.session.select_list(&id, Params::from_args(args)).await
    }

    /// Run `namespace.operation` as a single-row query.
    pub async fn select_one<T: Entity>(
        &mut self,
        operation: &str,
        args: Vec<Arg<'_>>,
    ) -> Result<Option<T>> {
        let id = statement_id(&self.namespace, operation);
        self.session.select_one(&id, Params::from_args(args)).await
    }
}

impl fmt::Debug for Mapper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
