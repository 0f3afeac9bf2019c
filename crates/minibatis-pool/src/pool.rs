//! Connection pool implementation.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::context::ContextId;
use crate::error::PoolError;
use crate::lifecycle::{ConnectionLifecycle, ConnectionManager, ConnectionMetadata};

/// Exclusive access to a pooled physical connection.
pub type ConnectionGuard<'a, C> = tokio::sync::MutexGuard<'a, C>;

/// One physical connection owned by the pool.
struct Slot<C> {
    id: u64,
    conn: tokio::sync::Mutex<C>,
    metadata: Mutex<ConnectionMetadata>,
}

/// An active checkout: which context holds which connection, and under
/// which lease number.
struct Lease<C> {
    slot: Arc<Slot<C>>,
    context: ContextId,
    number: u64,
}

struct PoolState<C> {
    idle: VecDeque<Arc<Slot<C>>>,
    active: HashMap<u64, Lease<C>>,
    bindings: HashMap<ContextId, u64>,
    // Callers inside `acquire`, granted or not yet.
    waiters: usize,
    replenishing: bool,
    closed: bool,
}

/// Counts a caller as waiting for as long as it is inside `acquire`,
/// including when the acquire future is dropped mid-wait.
struct Waiting<'a, C>(&'a Mutex<PoolState<C>>);

impl<'a, C> Waiting<'a, C> {
    fn register(state: &'a Mutex<PoolState<C>>) -> Self {
        state.lock().waiters += 1;
        Self(state)
    }
}

impl<C> Drop for Waiting<'_, C> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.waiters = state.waiters.saturating_sub(1);
    }
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Connection>>,
    // Mirrors `state.active.len()`; written only while `state` is locked.
    active_count: AtomicU32,
    available: Notify,
    next_connection_id: AtomicU64,
    next_lease: AtomicU64,
}

/// A bounded pool of database connections.
///
/// Cloning is cheap; all clones share the same connections.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`Pool`].
pub struct PoolBuilder<M> {
    manager: M,
    config: PoolConfig,
}

impl<M: ConnectionManager> PoolBuilder<M> {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of connections opened at construction.
    #[must_use]
    pub fn initial_size(mut self, count: u32) -> Self {
        self.config.initial_size = count;
        self
    }

    /// Set the idle top-up threshold.
    #[must_use]
    pub fn min_idle(mut self, count: u32) -> Self {
        self.config.min_idle = count;
        self
    }

    /// Set the maximum number of checked-out connections.
    #[must_use]
    pub fn max_active(mut self, count: u32) -> Self {
        self.config.max_active = count;
        self
    }

    /// Set the default acquisition timeout.
    #[must_use]
    pub fn max_wait(mut self, timeout: Duration) -> Self {
        self.config.max_wait = timeout;
        self
    }

    /// Wait instead of failing when at capacity.
    #[must_use]
    pub fn wait_on_capacity(mut self, enabled: bool) -> Self {
        self.config.wait_on_capacity = enabled;
        self
    }

    /// Open the pool.
    pub async fn build(self) -> Result<Pool<M>, PoolError> {
        Pool::new(self.manager, self.config).await
    }
}

impl<M: ConnectionManager> Pool<M> {
    /// Start building a pool around `manager`.
    pub fn builder(manager: M) -> PoolBuilder<M> {
        PoolBuilder {
            manager,
            config: PoolConfig::default(),
        }
    }

    /// Create a pool and eagerly open `config.initial_size` connections.
    ///
    /// Fails if the configuration is invalid or any initial connection
    /// cannot be opened; connections opened so far are closed again.
    pub async fn new(manager: M, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let initial_size = config.initial_size;
        let pool = Self {
            inner: Arc::new(PoolInner {
                manager,
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(initial_size as usize),
                    active: HashMap::new(),
                    bindings: HashMap::new(),
                    waiters: 0,
                    replenishing: false,
                    closed: false,
                }),
                config,
                active_count: AtomicU32::new(0),
                available: Notify::new(),
                next_connection_id: AtomicU64::new(1),
                next_lease: AtomicU64::new(1),
            }),
        };

        for _ in 0..initial_size {
            match pool.inner.open_slot().await {
                Ok(slot) => pool.inner.state.lock().idle.push_back(slot),
                Err(e) => {
                    pool.close().await;
                    return Err(e);
                }
            }
        }

        tracing::info!(
            initial_size,
            min_idle = pool.inner.config.min_idle,
            max_active = pool.inner.config.max_active,
            "connection pool opened"
        );
        Ok(pool)
    }

    /// Acquire a connection for `ctx`, waiting up to the configured `max_wait`.
    pub async fn get(&self, ctx: &ContextId) -> Result<PooledConnection<M>, PoolError> {
        self.acquire(ctx, self.inner.config.max_wait).await
    }

    /// Acquire a connection for `ctx`, waiting up to `timeout`.
    ///
    /// If `ctx` already holds a connection it is returned immediately.
    /// Otherwise an idle connection is taken, moved to the active set and
    /// bound to `ctx`. When none is idle the call waits for a release or a
    /// top-up; the wait is cancelled at the deadline and the call fails with
    /// [`PoolError::AcquisitionTimeout`].
    pub async fn acquire(
        &self,
        ctx: &ContextId,
        timeout: Duration,
    ) -> Result<PooledConnection<M>, PoolError> {
        let deadline = Instant::now() + timeout;
        let mut woken = false;
        let _waiting = Waiting::register(&self.inner.state);

        loop {
            // Register interest before inspecting state so a release between
            // the check and the wait is not lost.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let check_deadline = woken.then_some((deadline, timeout));
            if let Some(handle) = self.admit(ctx, check_deadline)? {
                return Ok(handle);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                tracing::debug!(
                    context = %ctx,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "connection acquisition timed out"
                );
                return Err(PoolError::AcquisitionTimeout(timeout));
            }
            woken = true;
        }
    }

    /// Acquire without waiting.
    ///
    /// Returns `Ok(None)` when no idle connection is available right now.
    pub fn try_acquire(&self, ctx: &ContextId) -> Result<Option<PooledConnection<M>>, PoolError> {
        self.admit(ctx, None)
    }

    /// One admission attempt. Every check and the move from idle to active
    /// happen under a single lock of the pool state.
    fn admit(
        &self,
        ctx: &ContextId,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<Option<PooledConnection<M>>, PoolError> {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock();

        if state.closed {
            return Err(PoolError::PoolClosed);
        }

        if let Some(lease) = state.bindings.get(ctx).and_then(|id| state.active.get(id)) {
            return Ok(Some(self.handle_for(lease)));
        }

        if let Some((deadline, timeout)) = deadline {
            if Instant::now() >= deadline {
                return Err(PoolError::AcquisitionTimeout(timeout));
            }
        }

        if state.active.len() >= config.max_active as usize {
            if config.wait_on_capacity {
                return Ok(None);
            }
            tracing::debug!(
                context = %ctx,
                max_active = config.max_active,
                "admission refused at capacity"
            );
            return Err(PoolError::CapacityExceeded {
                max: config.max_active,
            });
        }

        if state.idle.len() <= config.min_idle as usize && !state.replenishing {
            let reached = PoolError::MinIdleReached {
                idle: state.idle.len(),
                min_idle: config.min_idle,
            };
            state.replenishing = self.spawn_replenish(&reached);
        }

        let Some(slot) = state.idle.pop_front() else {
            return Ok(None);
        };

        slot.metadata.lock().mark_checkout();
        let lease = Lease {
            slot,
            context: *ctx,
            number: self.inner.next_lease.fetch_add(1, Ordering::Relaxed),
        };
        let handle = self.handle_for(&lease);

        state.bindings.insert(*ctx, lease.slot.id);
        state.active.insert(lease.slot.id, lease);
        self.inner
            .active_count
            .store(count_u32(state.active.len()), Ordering::Release);

        tracing::trace!(
            context = %ctx,
            connection_id = handle.id(),
            active = state.active.len(),
            idle = state.idle.len(),
            "connection acquired"
        );
        Ok(Some(handle))
    }

    /// Start a background top-up. Returns whether a task was spawned.
    fn spawn_replenish(&self, reached: &PoolError) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(reason = %reached, "no async runtime; skipping idle replenishment");
            return false;
        };

        tracing::info!(
            reason = %reached,
            batch = self.inner.config.replenish_batch(),
            "replenishing idle connections"
        );
        let inner = Arc::clone(&self.inner);
        runtime.spawn(inner.replenish());
        true
    }

    fn handle_for(&self, lease: &Lease<M::Connection>) -> PooledConnection<M> {
        PooledConnection {
            pool: self.clone(),
            slot: Arc::clone(&lease.slot),
            lease: lease.number,
            context: lease.context,
        }
    }

    /// Return a checked-out connection to the pool.
    ///
    /// The connection is reset to autocommit while still bound, then unbound,
    /// removed from the active set and queued as idle in one step. Releasing
    /// an already released handle is a no-op. If the reset fails the
    /// connection is discarded and the reset error is returned.
    pub async fn release(&self, handle: &PooledConnection<M>) -> Result<(), PoolError> {
        if !self.is_lease_active(handle.slot.id, handle.lease) {
            return Ok(());
        }

        handle.slot.metadata.lock().mark_resetting();
        let reset = handle.slot.conn.lock().await.reset().await;

        let discarded = {
            let mut state = self.inner.state.lock();
            let current = state
                .active
                .get(&handle.slot.id)
                .is_some_and(|lease| lease.number == handle.lease);
            if !current {
                return Ok(());
            }

            if state.bindings.get(&handle.context) == Some(&handle.slot.id) {
                state.bindings.remove(&handle.context);
            }
            state.active.remove(&handle.slot.id);
            self.inner
                .active_count
                .store(count_u32(state.active.len()), Ordering::Release);

            if reset.is_ok() && !state.closed {
                handle.slot.metadata.lock().mark_checkin();
                state.idle.push_back(Arc::clone(&handle.slot));
                None
            } else {
                Some(Arc::clone(&handle.slot))
            }
        };

        self.inner.available.notify_one();
        tracing::trace!(
            context = %handle.context,
            connection_id = handle.slot.id,
            discarded = discarded.is_some(),
            "connection released"
        );

        if let Some(slot) = discarded {
            close_slot(&slot).await;
        }

        reset.inspect_err(|e| {
            tracing::warn!(
                connection_id = handle.slot.id,
                error = %e,
                "discarded connection after failed reset"
            );
        })
    }

    fn is_lease_active(&self, connection_id: u64, lease: u64) -> bool {
        self.inner
            .state
            .lock()
            .active
            .get(&connection_id)
            .is_some_and(|l| l.number == lease)
    }

    /// Whether `ctx` currently holds a connection.
    #[must_use]
    pub fn is_bound(&self, ctx: &ContextId) -> bool {
        self.inner.state.lock().bindings.contains_key(ctx)
    }

    /// Number of checked-out connections, read without locking.
    #[must_use]
    pub fn active_count(&self) -> u32 {
        self.inner.active_count.load(Ordering::Acquire)
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        let idle = count_u32(state.idle.len());
        let active = count_u32(state.active.len());
        PoolStatus {
            idle,
            active,
            total: idle.saturating_add(active),
            max_active: self.inner.config.max_active,
        }
    }

    /// Close the pool.
    ///
    /// Idle connections are disconnected immediately; checked-out
    /// connections are disconnected when released. Waiting and subsequent
    /// acquires fail with [`PoolError::PoolClosed`].
    pub async fn close(&self) {
        let idle: Vec<_> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.idle.drain(..).collect()
        };

        self.inner.available.notify_waiters();
        for slot in &idle {
            close_slot(slot).await;
        }
        tracing::info!(disconnected = idle.len(), "connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// The connection manager this pool opens connections with.
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

impl<M: ConnectionManager> PoolInner<M> {
    async fn open_slot(&self) -> Result<Arc<Slot<M::Connection>>, PoolError> {
        let conn = self
            .manager
            .connect()
            .await
            .map_err(|e| PoolError::ConnectionCreation(Box::new(e)))?;
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = id, "opened physical connection");

        Ok(Arc::new(Slot {
            id,
            conn: tokio::sync::Mutex::new(conn),
            metadata: Mutex::new(ConnectionMetadata::new(id)),
        }))
    }

    /// Open batches of `replenish_batch()` connections until no caller is
    /// left waiting without an idle connection to take.
    async fn replenish(self: Arc<Self>) {
        let batch = self.config.replenish_batch();
        let mut opened = 0u32;
        let mut rounds = 0u32;

        loop {
            rounds += 1;
            let completed = self.replenish_batch(batch, &mut opened).await;

            let again = {
                let mut state = self.state.lock();
                let again = completed
                    && !state.closed
                    && state.waiters > state.idle.len()
                    && state.active.len() < self.config.max_active as usize;
                if !again {
                    state.replenishing = false;
                }
                again
            };
            if !again {
                break;
            }
        }

        tracing::debug!(opened, batch, rounds, "idle replenishment finished");
    }

    /// One batch. Returns false if it stopped early on a failure or close.
    async fn replenish_batch(&self, batch: u32, opened: &mut u32) -> bool {
        for _ in 0..batch {
            let slot = match self.open_slot().await {
                Ok(slot) => slot,
                Err(e) => {
                    tracing::warn!(error = %e, opened = *opened, batch, "idle replenishment failed");
                    return false;
                }
            };

            let leftover = {
                let mut state = self.state.lock();
                if state.closed {
                    Some(slot)
                } else {
                    state.idle.push_back(slot);
                    None
                }
            };
            if let Some(slot) = leftover {
                close_slot(&slot).await;
                return false;
            }

            *opened += 1;
            self.available.notify_one();
        }
        true
    }
}

async fn close_slot<C: ConnectionLifecycle>(slot: &Slot<C>) {
    slot.metadata.lock().mark_closed();
    slot.conn.lock().await.close().await;
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl<M: ConnectionManager> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub idle: u32,
    /// Number of connections currently checked out.
    pub active: u32,
    /// Total number of live connections.
    pub total: u32,
    /// Maximum allowed checked-out connections.
    pub max_active: u32,
}

/// A connection checked out of the pool and bound to one context.
///
/// Clones refer to the same checkout. [`close`](Self::close) returns the
/// connection to the pool rather than disconnecting it; after that every
/// clone reports [`is_released`](Self::is_released) and refuses
/// [`lock`](Self::lock).
pub struct PooledConnection<M: ConnectionManager> {
    pool: Pool<M>,
    slot: Arc<Slot<M::Connection>>,
    lease: u64,
    context: ContextId,
}

impl<M: ConnectionManager> Clone for PooledConnection<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            slot: Arc::clone(&self.slot),
            lease: self.lease,
            context: self.context,
        }
    }
}

impl<M: ConnectionManager> PooledConnection<M> {
    /// Identifier of the underlying physical connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    /// The context this checkout is bound to.
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Whether this checkout has ended.
    #[must_use]
    pub fn is_released(&self) -> bool {
        !self.pool.is_lease_active(self.slot.id, self.lease)
    }

    /// Whether both handles wrap the same physical connection.
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Snapshot of the connection's pool metadata.
    #[must_use]
    pub fn metadata(&self) -> ConnectionMetadata {
        self.slot.metadata.lock().clone()
    }

    /// Lock the physical connection for use.
    ///
    /// The guard must be dropped before calling [`close`](Self::close).
    pub async fn lock(&self) -> Result<ConnectionGuard<'_, M::Connection>, PoolError> {
        if self.is_released() {
            return Err(PoolError::Released);
        }
        let guard = self.slot.conn.lock().await;
        if self.is_released() {
            return Err(PoolError::Released);
        }
        Ok(guard)
    }

    /// Return the connection to the pool.
    pub async fn close(&self) -> Result<(), PoolError> {
        self.pool.release(self).await
    }
}

impl<M: ConnectionManager> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.slot.id)
            .field("context", &self.context)
            .field("lease", &self.lease)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::lifecycle::ConnectionState;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Debug, thiserror::Error)]
    #[error("connect refused")]
    struct Refused;

    #[derive(Default)]
    struct TestManager {
        connects: AtomicUsize,
        // Connects beyond this count fail.
        limit: Option<usize>,
        fail_reset: AtomicBool,
    }

    struct TestConn {
        auto_commit: bool,
        fail_reset: bool,
    }

    #[async_trait::async_trait]
    impl ConnectionManager for TestManager {
        type Connection = TestConn;
        type Error = Refused;

        async fn connect(&self) -> Result<TestConn, Refused> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if self.limit.is_some_and(|limit| n >= limit) {
                return Err(Refused);
            }
            Ok(TestConn {
                auto_commit: true,
                fail_reset: self.fail_reset.load(Ordering::SeqCst),
            })
        }
    }

    #[async_trait::async_trait]
    impl ConnectionLifecycle for TestConn {
        async fn reset(&mut self) -> Result<(), PoolError> {
            if self.fail_reset {
                return Err(PoolError::ResetFailed("broken link".into()));
            }
            self.auto_commit = true;
            Ok(())
        }
    }

    fn limited(limit: usize) -> TestManager {
        TestManager {
            limit: Some(limit),
            ..TestManager::default()
        }
    }

    async fn pool_with(config: PoolConfig) -> Pool<TestManager> {
        Pool::new(TestManager::default(), config).await.unwrap()
    }

    #[tokio::test]
    async fn test_construction_opens_initial_size() {
        let pool = pool_with(PoolConfig::new().initial_size(4).min_idle(1)).await;

        let status = pool.status();
        assert_eq!(status.idle, 4);
        assert_eq!(status.active, 0);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.manager().connects.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_same_context_observes_same_connection() {
        let pool = pool_with(PoolConfig::new().initial_size(4).min_idle(0)).await;
        let ctx = ContextId::new();

        let first = pool.get(&ctx).await.unwrap();
        let second = pool.get(&ctx).await.unwrap();

        assert!(first.same_connection(&second));
        assert_eq!(pool.active_count(), 1);
        assert!(pool.is_bound(&ctx));
    }

    #[tokio::test]
    async fn test_distinct_contexts_get_distinct_connections() {
        let pool = pool_with(PoolConfig::new().initial_size(4).min_idle(0)).await;

        let a = pool.get(&ContextId::new()).await.unwrap();
        let b = pool.get(&ContextId::new()).await.unwrap();

        assert!(!a.same_connection(&b));
        assert_eq!(pool.status().active, 2);
    }

    #[tokio::test]
    async fn test_release_unbinds_and_returns_to_idle() {
        let pool = pool_with(PoolConfig::new().initial_size(2).min_idle(0)).await;
        let ctx = ContextId::new();

        let conn = pool.get(&ctx).await.unwrap();
        let alias = conn.clone();
        assert!(!conn.is_released());

        conn.close().await.unwrap();

        assert!(conn.is_released());
        assert!(alias.is_released());
        assert!(!pool.is_bound(&ctx));
        assert_eq!(pool.status().active, 0);
        assert_eq!(pool.status().idle, 2);
        assert!(matches!(alias.lock().await, Err(PoolError::Released)));

        // Double release is a no-op.
        alias.close().await.unwrap();
        assert_eq!(pool.status().idle, 2);
    }

    #[tokio::test]
    async fn test_reacquire_after_release_starts_new_lease() {
        let pool = pool_with(PoolConfig::new().initial_size(3).min_idle(0)).await;
        let ctx = ContextId::new();

        let first = pool.get(&ctx).await.unwrap();
        first.close().await.unwrap();
        let second = pool.get(&ctx).await.unwrap();

        // Old handle stays released even if the same physical connection
        // came back out of the idle queue.
        assert!(first.is_released());
        assert!(!second.is_released());

        let meta = second.metadata();
        assert_eq!(meta.state, ConnectionState::InUse);
        assert!(meta.checkout_count >= 1);
    }

    #[tokio::test]
    async fn test_release_restores_autocommit() {
        let pool = pool_with(PoolConfig::new().initial_size(1).min_idle(0)).await;
        let ctx = ContextId::new();

        let conn = pool.get(&ctx).await.unwrap();
        conn.lock().await.unwrap().auto_commit = false;
        conn.close().await.unwrap();

        let again = pool.get(&ContextId::new()).await.unwrap();
        assert!(again.lock().await.unwrap().auto_commit);
    }

    #[tokio::test]
    async fn test_failed_reset_discards_connection() {
        let manager = TestManager {
            fail_reset: AtomicBool::new(true),
            ..TestManager::default()
        };
        let pool = Pool::new(manager, PoolConfig::new().initial_size(2).min_idle(0))
            .await
            .unwrap();

        let conn = pool.get(&ContextId::new()).await.unwrap();
        let err = conn.close().await.unwrap_err();

        assert!(matches!(err, PoolError::ResetFailed(_)));
        assert!(conn.is_released());
        assert_eq!(pool.status().idle, 1);
        assert_eq!(pool.status().active, 0);
    }

    #[tokio::test]
    async fn test_capacity_exceeded_is_immediate_and_distinct() {
        let pool = pool_with(PoolConfig::new().initial_size(3).min_idle(0).max_active(1)).await;

        let _held = pool.get(&ContextId::new()).await.unwrap();
        let err = pool.get(&ContextId::new()).await.unwrap_err();

        assert!(matches!(err, PoolError::CapacityExceeded { max: 1 }));
        assert_eq!(pool.status().active, 1);
    }

    #[tokio::test]
    async fn test_bound_context_unaffected_by_capacity() {
        let pool = pool_with(PoolConfig::new().initial_size(2).min_idle(0).max_active(1)).await;
        let ctx = ContextId::new();

        let first = pool.get(&ctx).await.unwrap();
        let again = pool.get(&ctx).await.unwrap();
        assert!(first.same_connection(&again));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_on_capacity_takes_released_connection() {
        let pool = pool_with(
            PoolConfig::new()
                .initial_size(2)
                .min_idle(0)
                .max_active(1)
                .wait_on_capacity(true),
        )
        .await;

        let held = pool.get(&ContextId::new()).await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.acquire(&ContextId::new(), Duration::from_secs(5)).await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        held.close().await.unwrap();

        let granted = waiter.await.unwrap().unwrap();
        assert!(!granted.is_released());
        assert_eq!(pool.status().active, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_on_capacity_times_out() {
        let pool = pool_with(
            PoolConfig::new()
                .initial_size(2)
                .min_idle(0)
                .max_active(1)
                .wait_on_capacity(true),
        )
        .await;

        let _held = pool.get(&ContextId::new()).await.unwrap();
        let err = pool
            .acquire(&ContextId::new(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::AcquisitionTimeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pool_times_out_within_deadline() {
        // Nothing idle and every top-up attempt fails.
        let pool = Pool::new(limited(0), PoolConfig::new().initial_size(0).min_idle(0))
            .await
            .unwrap();

        let started = Instant::now();
        let err = pool
            .acquire(&ContextId::new(), Duration::from_millis(300))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, PoolError::AcquisitionTimeout(_)));
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
        assert_eq!(pool.status().active, 0);
    }

    #[tokio::test]
    async fn test_replenishes_when_idle_reaches_min_idle() {
        let pool = pool_with(PoolConfig::new().initial_size(3).min_idle(2)).await;

        // 3 idle > 2: no top-up.
        let _a = pool.get(&ContextId::new()).await.unwrap();
        assert_eq!(pool.manager().connects.load(Ordering::SeqCst), 3);

        // 2 idle <= 2: top-up of 2 / 2 + 1 = 2 connections.
        let _b = pool.get(&ContextId::new()).await.unwrap();

        for _ in 0..100 {
            if pool.status().idle == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(pool.status().idle, 3);
        assert_eq!(pool.manager().connects.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_replenishment_failure_does_not_fail_acquire() {
        let pool = Pool::new(limited(1), PoolConfig::new().initial_size(1).min_idle(1))
            .await
            .unwrap();

        let conn = pool.get(&ContextId::new()).await;
        assert!(conn.is_ok());
    }

    #[tokio::test]
    async fn test_first_acquire_from_empty_pool_waits_for_top_up() {
        let pool = pool_with(PoolConfig::new().initial_size(0).min_idle(0)).await;

        let conn = pool
            .acquire(&ContextId::new(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!conn.is_released());
    }

    #[tokio::test]
    async fn test_concurrent_acquires_from_empty_pool_all_granted() {
        let pool = pool_with(PoolConfig::new().initial_size(0).min_idle(0).max_active(5)).await;
        let timeout = Duration::from_secs(1);
        let (a, b, c) = (ContextId::new(), ContextId::new(), ContextId::new());

        let (a, b, c) = tokio::join!(
            pool.acquire(&a, timeout),
            pool.acquire(&b, timeout),
            pool.acquire(&c, timeout),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert!(!a.same_connection(&b));
        assert!(!b.same_connection(&c));
        assert!(!a.same_connection(&c));
        assert_eq!(pool.status().active, 3);
    }

    #[tokio::test]
    async fn test_top_up_stops_at_capacity() {
        let pool = pool_with(PoolConfig::new().initial_size(0).min_idle(0).max_active(2)).await;
        let timeout = Duration::from_secs(1);
        let (a, b) = (ContextId::new(), ContextId::new());

        let (a, b) = tokio::join!(pool.acquire(&a, timeout), pool.acquire(&b, timeout));
        assert!(a.is_ok() && b.is_ok());

        tokio::task::yield_now().await;
        assert!(pool.manager().connects.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.status().active, 2);
    }

    #[tokio::test]
    async fn test_discarded_connection_marked_closed() {
        let manager = TestManager {
            fail_reset: AtomicBool::new(true),
            ..TestManager::default()
        };
        let pool = Pool::new(manager, PoolConfig::new().initial_size(1).min_idle(0))
            .await
            .unwrap();

        let conn = pool.get(&ContextId::new()).await.unwrap();
        assert!(conn.close().await.is_err());
        assert_eq!(conn.metadata().state, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_construction_failure() {
        let err = Pool::new(limited(2), PoolConfig::new().initial_size(3).min_idle(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::ConnectionCreation(_)));
        assert_eq!(err.to_string(), "failed to create connection: connect refused");
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_acquire() {
        let pool = pool_with(PoolConfig::new().initial_size(2).min_idle(0)).await;
        let ctx = ContextId::new();
        let held = pool.get(&ctx).await.unwrap();

        pool.close().await;
        assert!(pool.is_closed());
        assert_eq!(pool.status().idle, 0);
        assert!(matches!(
            pool.get(&ContextId::new()).await,
            Err(PoolError::PoolClosed)
        ));

        // A checkout outstanding at close is disconnected on release.
        held.close().await.unwrap();
        assert_eq!(pool.status().total, 0);
    }

    #[tokio::test]
    async fn test_try_acquire_does_not_wait() {
        let pool = pool_with(PoolConfig::new().initial_size(1).min_idle(0)).await;

        let first = pool.try_acquire(&ContextId::new()).unwrap();
        assert!(first.is_some());

        // Nothing idle now; the top-up runs in the background.
        let second = pool.try_acquire(&ContextId::new()).unwrap();
        assert!(second.is_none());
    }
}
