//! Named environments.
//!
//! An [`Environments`] registry maps environment names to session
//! factories. Each environment's pool is built on the first request for
//! that name and kept until [`Environments::shutdown`]. Concurrent first
//! requests build exactly one pool; a failed build is not remembered, so
//! the next request tries again.
//!
//! One registry can be installed process-wide:
//!
//! ```rust,ignore
//! let envs = Environments::builder()
//!     .driver(Arc::new(MyDriver))
//!     .config_source(PropertiesDir::new("conf"))
//!     .statements(Arc::new(store))
//!     .build()?;
//! Environments::install(envs)?;
//!
//! let mut session = Environments::global()?.open_default_session(true).await?;
//! // ...
//! Environments::global()?.shutdown().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{ConfigSource, DEFAULT_ENVIRONMENT};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::factory::SqlSessionFactory;
use crate::session::SqlSession;
use crate::statement::StatementStore;

type FactoryCell = Arc<tokio::sync::OnceCell<SqlSessionFactory>>;

static GLOBAL: once_cell::sync::OnceCell<Environments> = once_cell::sync::OnceCell::new();

/// Name → session factory registry.
pub struct Environments {
    drivers: HashMap<String, Arc<dyn Driver>>,
    config: Arc<dyn ConfigSource>,
    statements: Arc<StatementStore>,
    factories: Mutex<HashMap<String, FactoryCell>>,
}

impl Environments {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> EnvironmentsBuilder {
        EnvironmentsBuilder::default()
    }

    /// Install `envs` as the process-wide registry.
    ///
    /// Fails with [`Error::Config`] if one is already installed.
    pub fn install(envs: Self) -> Result<&'static Self> {
        GLOBAL
            .set(envs)
            .map_err(|_| Error::Config("environments already installed".into()))?;
        Self::global()
    }

    /// The process-wide registry.
    ///
    /// Fails with [`Error::Config`] until [`install`](Self::install) is called.
    pub fn global() -> Result<&'static Self> {
        GLOBAL
            .get()
            .ok_or_else(|| Error::Config("no environments installed".into()))
    }

    /// The session factory of environment `name`, building its pool on
    /// first use.
    pub async fn factory(&self, name: &str) -> Result<SqlSessionFactory> {
        let cell = {
            let mut factories = self.factories.lock();
            Arc::clone(factories.entry(name.to_owned()).or_default())
        };

        cell.get_or_try_init(|| self.build_factory(name))
            .await
            .cloned()
    }

    async fn build_factory(&self, name: &str) -> Result<SqlSessionFactory> {
        let config = self.config.load(name)?;
        let driver = self
            .drivers
            .get(&config.driver)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no driver registered as {}", config.driver)))?;

        tracing::info!(environment = name, url = %config.url, "building environment");
        SqlSessionFactory::connect(name, driver, &config, Arc::clone(&self.statements))
            .await
            .inspect_err(|e| {
                tracing::warn!(environment = name, error = %e, "environment build failed");
            })
    }

    /// Open a session against environment `name`.
    pub async fn open_session(&self, name: &str, auto_commit: bool) -> Result<SqlSession> {
        Ok(self.factory(name).await?.open_session(auto_commit))
    }

    /// Open a session against the `default-config` environment.
    pub async fn open_default_session(&self, auto_commit: bool) -> Result<SqlSession> {
        self.open_session(DEFAULT_ENVIRONMENT, auto_commit).await
    }

    /// Names of environments whose pool has been built.
    #[must_use]
    pub fn environments(&self) -> Vec<String> {
        let factories = self.factories.lock();
        let mut names: Vec<_> = factories
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Close every built pool and forget it.
    ///
    /// A later request for the same name builds a fresh pool.
    pub async fn shutdown(&self) {
        let cells: Vec<(String, FactoryCell)> = {
            let mut factories = self.factories.lock();
            factories.drain().collect()
        };

        for (name, cell) in cells {
            if let Some(factory) = cell.get() {
                factory.close().await;
                tracing::info!(environment = %name, "environment shut down");
            }
        }
    }
}

impl fmt::Debug for Environments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environments")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("environments", &self.environments())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Environments`].
#[derive(Default)]
pub struct EnvironmentsBuilder {
    drivers: HashMap<String, Arc<dyn Driver>>,
    config: Option<Arc<dyn ConfigSource>>,
    statements: Option<Arc<StatementStore>>,
}

impl EnvironmentsBuilder {
    /// Register a driver under its [`Driver::name`].
    #[must_use]
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(driver.name().to_owned(), driver);
        self
    }

    /// Set where environment configurations come from.
    #[must_use]
    pub fn config_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config = Some(Arc::new(source));
        self
    }

    /// Set the mapping entries every environment's sessions share.
    #[must_use]
    pub fn statements(mut self, statements: Arc<StatementStore>) -> Self {
        self.statements = Some(statements);
        self
    }

    /// Build the registry. No pool is opened yet.
    pub fn build(self) -> Result<Environments> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("no config source set".into()))?;

        Ok(Environments {
            drivers: self.drivers,
            config,
            statements: self
                .statements
                .unwrap_or_else(|| Arc::new(StatementStore::builder().build())),
            factories: Mutex::new(HashMap::new()),
        })
    }
}

impl fmt::Debug for EnvironmentsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentsBuilder")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("has_config", &self.config.is_some())
            .finish_non_exhaustive()
    }
}
