//! Database connection capability.
//!
//! minibatis does not speak any wire protocol itself. A [`Driver`] opens
//! [`Connection`]s, and the session layer only ever talks to those traits.
//! [`DriverManager`] adapts a driver to the pool's
//! [`ConnectionManager`](minibatis_pool::ConnectionManager) seam.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use minibatis_pool::{ConnectionLifecycle, ConnectionManager, PoolError};
use minibatis_types::SqlValue;
use thiserror::Error;

use crate::row::RowSet;

/// Errors reported by a driver or one of its connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// The database could not be reached or refused the connection.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The database rejected or failed a statement.
    #[error("statement failed: {0}")]
    Execution(String),

    /// Commit, rollback or autocommit change failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}

impl DriverError {
    /// Check if this error may clear up on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Closed)
    }
}

/// Where and as whom to connect.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Driver-specific connect target.
    pub url: String,
    /// Login name.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
}

impl ConnectOptions {
    /// Create options for `url` without credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
        }
    }

    /// Set the login credentials.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// An open database connection.
///
/// Implementations follow JDBC transaction semantics: in autocommit mode
/// every statement commits on its own, and switching autocommit back on
/// commits any pending transaction.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DriverError>;

    /// Execute a query and return its rows.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<RowSet, DriverError>;

    /// Switch autocommit mode.
    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// Current autocommit mode.
    fn auto_commit(&self) -> bool;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Physically disconnect.
    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Factory for [`Connection`]s, registered by name.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Name configuration files refer to this driver by.
    fn name(&self) -> &str;

    /// Open a new connection.
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DriverError>;
}

/// Opens pooled connections through a [`Driver`].
pub struct DriverManager {
    driver: Arc<dyn Driver>,
    options: ConnectOptions,
}

impl DriverManager {
    /// Create a manager that connects with `options`.
    pub fn new(driver: Arc<dyn Driver>, options: ConnectOptions) -> Self {
        Self { driver, options }
    }

    /// The driver used to open connections.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The options connections are opened with.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }
}

impl fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverManager")
            .field("driver", &self.driver.name())
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl ConnectionManager for DriverManager {
    type Connection = Box<dyn Connection>;
    type Error = DriverError;

    async fn connect(&self) -> Result<Box<dyn Connection>, DriverError> {
        tracing::debug!(
            driver = self.driver.name(),
            url = %self.options.url,
            "opening database connection"
        );
        self.driver.connect(&self.options).await
    }
}

#[async_trait]
impl ConnectionLifecycle for Box<dyn Connection> {
    async fn reset(&mut self) -> Result<(), PoolError> {
        if self.auto_commit() {
            return Ok(());
        }
        self.set_auto_commit(true)
            .await
            .map_err(|e| PoolError::ResetFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = Connection::close(self.as_mut()).await {
            tracing::debug!(error = %e, "error while disconnecting");
        }
    }
}
