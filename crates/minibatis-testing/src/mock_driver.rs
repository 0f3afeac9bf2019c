//! In-memory mock driver for unit testing.
//!
//! [`MockDriver`] implements [`minibatis::Driver`] without a database. Every
//! statement is answered from a table of scripted responses keyed by the
//! exact positional SQL, and every call a connection receives is recorded
//! so tests can assert on what a session actually sent.
//!
//! ## Example
//!
//! ```rust,ignore
//! use minibatis_testing::{MockDriver, MockResponse};
//!
//! let driver = MockDriver::builder()
//!     .with_response(
//!         "select id, name from t_user where id = ?",
//!         MockResponse::rows(["id", "name"], vec![vec![1i64.into(), "Li".into()]]),
//!     )
//!     .with_default_response(MockResponse::affected(1))
//!     .build();
//!
//! // hand Arc::new(driver.clone()) to Environments::builder().driver(..)
//! assert_eq!(driver.statements().len(), 0);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use minibatis::{ColMetaData, ConnectOptions, Connection, Driver, DriverError, RowSet, SqlValue};
use parking_lot::Mutex;

/// Driver name [`MockDriver`] registers under unless renamed.
pub const MOCK_DRIVER_NAME: &str = "mock";

type Handler = Arc<dyn Fn(&str, &[SqlValue]) -> MockResponse + Send + Sync>;

/// Mock response configuration.
#[derive(Clone)]
pub enum MockResponse {
    /// Return rows with the given column names.
    Rows {
        /// Column names, typically snake_case.
        columns: Vec<String>,
        /// Row data, positional.
        rows: Vec<Vec<SqlValue>>,
    },

    /// Return an affected-row count (for INSERT/UPDATE/DELETE).
    RowsAffected(u64),

    /// Fail the call.
    Error(DriverError),

    /// Compute the response from the SQL and parameters.
    Custom(Handler),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", columns)
                .field("rows", &rows.len())
                .finish(),
            Self::RowsAffected(n) => f.debug_tuple("RowsAffected").field(n).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// Rows under the given column names.
    pub fn rows<I, S>(columns: I, rows: Vec<Vec<SqlValue>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Rows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// No rows and no affected count.
    pub fn empty() -> Self {
        Self::RowsAffected(0)
    }

    /// An affected-row count.
    pub fn affected(count: u64) -> Self {
        Self::RowsAffected(count)
    }

    /// An execution failure with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(DriverError::Execution(message.into()))
    }

    /// A response computed per call.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&str, &[SqlValue]) -> MockResponse + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(handler))
    }

    fn resolve(&self, sql: &str, params: &[SqlValue]) -> Self {
        match self {
            Self::Custom(handler) => handler(sql, params).resolve(sql, params),
            other => other.clone(),
        }
    }
}

/// One call a mock connection received.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    /// `execute` with its SQL and parameters.
    Execute {
        /// Positional SQL.
        sql: String,
        /// Bound parameters.
        params: Vec<SqlValue>,
    },
    /// `query` with its SQL and parameters.
    Query {
        /// Positional SQL.
        sql: String,
        /// Bound parameters.
        params: Vec<SqlValue>,
    },
    /// `set_auto_commit`.
    SetAutoCommit(bool),
    /// `commit`.
    Commit,
    /// `rollback`.
    Rollback,
    /// `close`.
    Close,
}

/// A [`MockEvent`] tagged with the connection that received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Connection number, starting at 1 in connect order.
    pub connection: u64,
    /// What happened.
    pub event: MockEvent,
}

struct Shared {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    fail_connect_after: Option<u64>,
    connects: AtomicU64,
    fail_commit: AtomicBool,
    fail_auto_commit: AtomicBool,
    events: Mutex<Vec<RecordedEvent>>,
}

impl Shared {
    fn record(&self, connection: u64, event: MockEvent) {
        self.events.lock().push(RecordedEvent { connection, event });
    }

    fn respond(&self, sql: &str, params: &[SqlValue]) -> MockResponse {
        self.responses
            .get(sql.trim())
            .unwrap_or(&self.default_response)
            .resolve(sql, params)
    }
}

/// Builder for [`MockDriver`].
pub struct MockDriverBuilder {
    name: String,
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    fail_connect_after: Option<u64>,
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriverBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            name: MOCK_DRIVER_NAME.to_string(),
            responses: HashMap::new(),
            default_response: MockResponse::empty(),
            fail_connect_after: None,
        }
    }

    /// Register under a different driver name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Answer `sql` (matched exactly, after trimming) with `response`.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into().trim().to_string(), response);
        self
    }

    /// Answer every unscripted statement with `response`.
    #[must_use]
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Let the first `count` connects succeed and fail every later one.
    #[must_use]
    pub fn fail_connect_after(mut self, count: u64) -> Self {
        self.fail_connect_after = Some(count);
        self
    }

    /// Build the driver.
    pub fn build(self) -> MockDriver {
        MockDriver {
            name: self.name,
            shared: Arc::new(Shared {
                responses: self.responses,
                default_response: self.default_response,
                fail_connect_after: self.fail_connect_after,
                connects: AtomicU64::new(0),
                fail_commit: AtomicBool::new(false),
                fail_auto_commit: AtomicBool::new(false),
                events: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Scripted in-memory driver.
///
/// Clones share responses, counters and the event log.
#[derive(Clone)]
pub struct MockDriver {
    name: String,
    shared: Arc<Shared>,
}

impl MockDriver {
    /// Create a new builder.
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> u64 {
        self.shared
            .connects
            .load(Ordering::SeqCst)
            .min(self.shared.fail_connect_after.unwrap_or(u64::MAX))
    }

    /// Make every later commit fail (or succeed again).
    pub fn set_fail_commit(&self, fail: bool) {
        self.shared.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Make every later autocommit change fail (or succeed again).
    pub fn set_fail_auto_commit(&self, fail: bool) {
        self.shared.fail_auto_commit.store(fail, Ordering::SeqCst);
    }

    /// Every recorded event, oldest first.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.shared.events.lock().clone()
    }

    /// Events of one connection, oldest first.
    pub fn events_for(&self, connection: u64) -> Vec<MockEvent> {
        self.shared
            .events
            .lock()
            .iter()
            .filter(|e| e.connection == connection)
            .map(|e| e.event.clone())
            .collect()
    }

    /// SQL and parameters of every `execute` and `query`, oldest first.
    pub fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.shared
            .events
            .lock()
            .iter()
            .filter_map(|e| match &e.event {
                MockEvent::Execute { sql, params } | MockEvent::Query { sql, params } => {
                    Some((sql.clone(), params.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Count events matching `pred`.
    pub fn count_events(&self, pred: impl Fn(&MockEvent) -> bool) -> usize {
        self.shared
            .events
            .lock()
            .iter()
            .filter(|e| pred(&e.event))
            .count()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.shared.events.lock().clear();
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("name", &self.name)
            .field("responses", &self.shared.responses.len())
            .field("connects", &self.shared.connects.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DriverError> {
        let id = self.shared.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if self.shared.fail_connect_after.is_some_and(|limit| id > limit) {
            return Err(DriverError::Connection(format!(
                "{}: connection refused",
                options.url
            )));
        }

        tracing::trace!(connection = id, url = %options.url, "mock connection opened");
        Ok(Box::new(MockConnection {
            id,
            auto_commit: true,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Connection handed out by [`MockDriver`].
pub struct MockConnection {
    id: u64,
    auto_commit: bool,
    shared: Arc<Shared>,
}

impl MockConnection {
    /// Connection number, starting at 1 in connect order.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection")
            .field("id", &self.id)
            .field("auto_commit", &self.auto_commit)
            .finish()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DriverError> {
        self.shared.record(
            self.id,
            MockEvent::Execute {
                sql: sql.to_string(),
                params: params.to_vec(),
            },
        );

        match self.shared.respond(sql, params) {
            MockResponse::RowsAffected(n) => Ok(n),
            MockResponse::Rows { rows, .. } => Ok(rows.len() as u64),
            MockResponse::Error(e) => Err(e),
            MockResponse::Custom(_) => Ok(0),
        }
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<RowSet, DriverError> {
        self.shared.record(
            self.id,
            MockEvent::Query {
                sql: sql.to_string(),
                params: params.to_vec(),
            },
        );

        match self.shared.respond(sql, params) {
            MockResponse::Rows { columns, rows } => {
                Ok(RowSet::new(ColMetaData::from_names(columns), rows))
            }
            MockResponse::RowsAffected(_) | MockResponse::Custom(_) => Ok(RowSet::empty()),
            MockResponse::Error(e) => Err(e),
        }
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.shared.record(self.id, MockEvent::SetAutoCommit(enabled));
        if self.shared.fail_auto_commit.load(Ordering::SeqCst) {
            return Err(DriverError::Transaction("autocommit change rejected".into()));
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.shared.record(self.id, MockEvent::Commit);
        if self.shared.fail_commit.load(Ordering::SeqCst) {
            return Err(DriverError::Transaction("commit rejected".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.shared.record(self.id, MockEvent::Rollback);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.shared.record(self.id, MockEvent::Close);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn options() -> ConnectOptions {
        ConnectOptions::new("mock://test")
    }

    #[tokio::test]
    async fn test_scripted_query() {
        let driver = MockDriver::builder()
            .with_response(
                "select id from t where id = ?",
                MockResponse::rows(["id"], vec![vec![SqlValue::BigInt(1)]]),
            )
            .build();

        let mut conn = driver.connect(&options()).await.unwrap();
        let rows: Vec<_> = conn
            .query("select id from t where id = ?", &[SqlValue::BigInt(1)])
            .await
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(
            driver.statements(),
            vec![(
                "select id from t where id = ?".to_string(),
                vec![SqlValue::BigInt(1)]
            )]
        );
    }

    #[tokio::test]
    async fn test_default_and_custom_responses() {
        let driver = MockDriver::builder()
            .with_response(
                "update t set x = ?",
                MockResponse::custom(|_, params| MockResponse::affected(params.len() as u64)),
            )
            .with_default_response(MockResponse::error("no such table"))
            .build();

        let mut conn = driver.connect(&options()).await.unwrap();
        assert_eq!(
            conn.execute("update t set x = ?", &[SqlValue::Int(1)]).await.unwrap(),
            1
        );
        assert!(matches!(
            conn.execute("delete from nowhere", &[]).await,
            Err(DriverError::Execution(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_connect_after() {
        let driver = MockDriver::builder().fail_connect_after(1).build();

        assert!(driver.connect(&options()).await.is_ok());
        assert!(matches!(
            driver.connect(&options()).await,
            Err(DriverError::Connection(_))
        ));
        assert_eq!(driver.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_transaction_events_recorded() {
        let driver = MockDriver::builder().build();
        let mut conn = driver.connect(&options()).await.unwrap();

        conn.set_auto_commit(false).await.unwrap();
        conn.commit().await.unwrap();
        driver.set_fail_commit(true);
        assert!(conn.commit().await.is_err());
        conn.rollback().await.unwrap();

        assert_eq!(
            driver.events_for(1),
            vec![
                MockEvent::SetAutoCommit(false),
                MockEvent::Commit,
                MockEvent::Commit,
                MockEvent::Rollback,
            ]
        );
        assert!(!conn.auto_commit());
    }

    #[tokio::test]
    async fn test_auto_commit_failure_keeps_mode() {
        let driver = MockDriver::builder().build();
        let mut conn = driver.connect(&options()).await.unwrap();

        driver.set_fail_auto_commit(true);
        assert!(conn.set_auto_commit(false).await.is_err());
        assert!(conn.auto_commit());
    }
}
