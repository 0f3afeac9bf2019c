//! Session factory for one environment.

use std::fmt;
use std::sync::Arc;

use minibatis_pool::{ContextId, Pool, PoolStatus};

use crate::config::DataSourceConfig;
use crate::driver::{Driver, DriverManager};
use crate::error::Result;
use crate::session::SqlSession;
use crate::statement::StatementStore;
use crate::transaction::TransactionContext;

/// Opens sessions against one pooled environment.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct SqlSessionFactory {
    name: Arc<str>,
    pool: Pool<DriverManager>,
    statements: Arc<StatementStore>,
}

impl SqlSessionFactory {
    /// Wrap an existing pool.
    pub fn new(
        name: impl Into<Arc<str>>,
        pool: Pool<DriverManager>,
        statements: Arc<StatementStore>,
    ) -> Self {
        Self {
            name: name.into(),
            pool,
            statements,
        }
    }

    /// Build the pool described by `config` and wrap it.
    ///
    /// Opens `config.pool.initial_size` connections before returning; a
    /// driver failure while doing so is returned as [`Error::Driver`](crate::Error::Driver).
    pub async fn connect(
        name: impl Into<Arc<str>>,
        driver: Arc<dyn Driver>,
        config: &DataSourceConfig,
        statements: Arc<StatementStore>,
    ) -> Result<Self> {
        let name = name.into();
        let manager = DriverManager::new(driver, config.connect_options());
        let pool = Pool::new(manager, config.pool.clone()).await?;

        tracing::info!(
            environment = %name,
            driver = %config.driver,
            max_active = config.pool.max_active,
            "environment pool ready"
        );
        Ok(Self::new(name, pool, statements))
    }

    /// Open a session with its own context.
    #[must_use]
    pub fn open_session(&self, auto_commit: bool) -> SqlSession {
        self.open_session_in(ContextId::new(), auto_commit)
    }

    /// Open a session bound to `context`.
    ///
    /// Sessions sharing a context share one connection while it is held.
    #[must_use]
    pub fn open_session_in(&self, context: ContextId, auto_commit: bool) -> SqlSession {
        let transaction = TransactionContext::new(self.pool.clone(), context, auto_commit);
        SqlSession::new(Arc::clone(&self.statements), transaction)
    }

    /// Environment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The environment's pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<DriverManager> {
        &self.pool
    }

    /// Pool occupancy snapshot.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Mapping entries sessions resolve ids against.
    #[must_use]
    pub fn statements(&self) -> &Arc<StatementStore> {
        &self.statements
    }

    /// Close the pool. Sessions opened afterwards fail on their first statement.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl fmt::Debug for SqlSessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSessionFactory")
            .field("name", &self.name)
            .field("pool", &self.pool.status())
            .finish_non_exhaustive()
    }
}
