//! Fixed-size SQLite connection pool with a FIFO wait queue.
//!
//! Every handle is opened when the pool is built. Callers that find no idle handle wait
//! in a queue for at most `queue_timeout`; a released handle goes straight to the head
//! waiter without passing through the idle list. Handles idle for longer than
//! `idle_timeout` are closed by a background sweep and never replaced. Closing the pool
//! waits, for at most `connection_timeout`, for checked-out handles to come back.

use chrono::{DateTime, Utc};
use guildbot_core::PoolStats;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, timeout_at, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::query::{self, QueryMethod, QueryOutput, SqlParam};

/// A live database handle while it is owned by the pool or a caller.
struct Checkout {
    id: u64,
    handle: SqliteConnection,
    created_at: DateTime<Utc>,
    last_used: Instant,
}

struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<Checkout>,
}

#[derive(Debug, Default, Clone, Copy)]
struct PoolCounters {
    created: u64,
    acquired: u64,
    released: u64,
    queued: u64,
    timeouts: u64,
    errors: u64,
}

struct PoolState {
    /// Live handles, idle or checked out.
    total: usize,
    /// Idle handles; the most recently released one is reused first.
    available: Vec<Checkout>,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
    closed: bool,
    /// Set while `close()` waits for checked-out handles to come back.
    draining: bool,
    counters: PoolCounters,
}

impl PoolState {
    fn take_idle(&mut self) -> Option<Checkout> {
        let mut checkout = self.available.pop()?;
        checkout.last_used = Instant::now();
        self.counters.acquired += 1;
        Some(checkout)
    }

    fn remove_waiter(&mut self, ticket: u64) -> bool {
        match self.waiters.iter().position(|waiter| waiter.ticket == ticket) {
            Some(position) => {
                self.waiters.remove(position);
                true
            }
            None => false,
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    returned: Notify,
}

impl PoolInner {
    /// Hands `checkout` to the oldest live waiter, or parks it on the idle list.
    fn release(&self, mut checkout: Checkout) {
        let mut state = self.state.lock();

        if state.closed {
            if state.draining {
                state.available.push(checkout);
                drop(state);
                self.returned.notify_one();
            } else {
                state.total -= 1;
                drop(state);
                debug!(connection_id = checkout.id, "Closing connection released after shutdown");
                close_detached(checkout);
            }
            return;
        }

        state.counters.released += 1;
        checkout.last_used = Instant::now();

        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.tx.send(checkout) {
                Ok(()) => {
                    state.counters.acquired += 1;
                    return;
                }
                // The waiter gave up after we popped it; try the next one.
                Err(returned) => checkout = returned,
            }
        }

        state.available.push(checkout);
    }

    /// Removes idle handles unused for at least `idle_timeout`. `None` once closed.
    fn retire_idle(&self, idle_timeout: Duration) -> Option<Vec<Checkout>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        let now = Instant::now();
        let (retired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.available)
            .into_iter()
            .partition(|checkout| now.saturating_duration_since(checkout.last_used) >= idle_timeout);

        state.available = kept;
        state.total -= retired.len();
        Some(retired)
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

/// Closes a handle on the current runtime if there is one; otherwise drops it.
fn close_detached(checkout: Checkout) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(error) = checkout.handle.close().await {
                    warn!(connection_id = checkout.id, error = %error, "Failed to close connection");
                }
            });
        }
        Err(_) => drop(checkout),
    }
}

/// Bounded pool of SQLite connections.
///
/// Cloning is cheap; clones share the same handles, queue and counters.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Opens `config.pool_size` connections to `database_url`.
    ///
    /// The database file is created if missing, with WAL journaling and foreign keys
    /// enabled. Any handle failing to open fails the whole pool.
    pub async fn new(database_url: &str, config: PoolConfig) -> Result<Self, PoolError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(PoolError::Connect)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        Self::with_options(options, config).await
    }

    /// Opens the pool with caller-provided connection options.
    pub async fn with_options(
        options: SqliteConnectOptions,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        let options = options.busy_timeout(config.connection_timeout);
        let mut available = Vec::with_capacity(config.pool_size);

        for id in 0..config.pool_size as u64 {
            let handle = timeout(config.connection_timeout, options.connect())
                .await
                .map_err(|_| PoolError::ConnectTimeout(config.connection_timeout))?
                .map_err(PoolError::Connect)?;

            available.push(Checkout {
                id,
                handle,
                created_at: Utc::now(),
                last_used: Instant::now(),
            });
        }

        let state = PoolState {
            total: available.len(),
            available,
            waiters: VecDeque::new(),
            next_ticket: 0,
            closed: false,
            draining: false,
            counters: PoolCounters {
                created: config.pool_size as u64,
                ..PoolCounters::default()
            },
        };

        info!(
            pool_size = config.pool_size,
            queue_timeout_ms = config.queue_timeout.as_millis() as u64,
            idle_timeout_ms = config.idle_timeout.map(|t| t.as_millis() as u64),
            "SQLite connection pool created"
        );

        let inner = Arc::new(PoolInner {
            config,
            state: Mutex::new(state),
            sweeper: Mutex::new(None),
            returned: Notify::new(),
        });
        spawn_sweeper(&inner);

        Ok(Self { inner })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Checks out a connection, waiting in line if none is idle.
    ///
    /// # Errors
    ///
    /// `QueueTimeout` if nothing is handed over within `queue_timeout`, `Closed` if the
    /// pool is or becomes closed while waiting.
    pub async fn get_connection(&self) -> Result<PooledConnection, PoolError> {
        let (ticket, rx) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }

            if let Some(checkout) = state.take_idle() {
                return Ok(PooledConnection::new(self.inner.clone(), checkout));
            }

            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(Waiter { ticket, tx });
            state.counters.queued += 1;
            (ticket, rx)
        };

        debug!(ticket, "No idle connection, waiting in queue");

        let mut request = QueuedRequest {
            inner: self.inner.clone(),
            ticket,
            rx,
            settled: false,
        };
        let checkout = request.wait(self.inner.config.queue_timeout).await?;

        Ok(PooledConnection::new(self.inner.clone(), checkout))
    }

    /// Returns a connection to this pool. Connections belonging to another pool go back
    /// to their own pool untouched by this one.
    pub fn release_connection(&self, mut conn: PooledConnection) {
        if !Arc::ptr_eq(&self.inner, &conn.pool) {
            debug!(connection_id = conn.id, "Ignoring release of a connection from another pool");
            return;
        }

        if let Some(checkout) = conn.checkout.take() {
            self.inner.release(checkout);
        }
    }

    /// Runs one statement on a pooled connection.
    ///
    /// The connection is back in the pool before this returns, whether the statement
    /// succeeded or not. Failures bump the `errors` counter and are not retried.
    pub async fn exec_query(
        &self,
        sql: &str,
        params: &[SqlParam],
        method: QueryMethod,
    ) -> Result<QueryOutput, PoolError> {
        let mut conn = self.get_connection().await?;
        let result = query::execute(&mut conn, sql, params, method).await;
        self.release_connection(conn);

        result.map_err(|error| {
            self.inner.state.lock().counters.errors += 1;
            warn!(error = %error, method = %method, "Query failed");
            PoolError::Query(error)
        })
    }

    /// Fails every queued waiter with `Closed`, then closes every handle.
    ///
    /// Idle handles are closed at once; checked-out ones as their holders release them.
    /// Resolves once all handles are closed, or after `connection_timeout` if some are
    /// still held, in which case the stragglers are closed in the background on release.
    /// Calling this twice is harmless.
    pub async fn close(&self) {
        let waiters = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.draining = true;
            std::mem::take(&mut state.waiters)
        };

        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }

        let rejected = waiters.len();
        drop(waiters);

        let deadline = tokio::time::Instant::now() + self.inner.config.connection_timeout;
        let mut closed = 0;

        loop {
            let (batch, outstanding) = {
                let mut state = self.inner.state.lock();
                let batch = std::mem::take(&mut state.available);
                state.total -= batch.len();
                if state.total == 0 {
                    state.draining = false;
                }
                (batch, state.total)
            };

            closed += batch.len();
            for checkout in batch {
                if let Err(error) = checkout.handle.close().await {
                    warn!(connection_id = checkout.id, error = %error, "Failed to close connection");
                }
            }

            if outstanding == 0 {
                break;
            }

            debug!(outstanding, "Waiting for checked-out connections before closing");
            if timeout_at(deadline, self.inner.returned.notified()).await.is_err() {
                let mut state = self.inner.state.lock();
                if state.available.is_empty() {
                    state.draining = false;
                    warn!(
                        outstanding = state.total,
                        "Connections still checked out at shutdown; closing them on release"
                    );
                    break;
                }
            }
        }

        info!(closed, rejected, "Connection pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        let available = state.available.len();
        let in_use = state.total - available;
        let counters = state.counters;

        PoolStats {
            pool_size: self.inner.config.pool_size,
            total_connections: state.total,
            available_connections: available,
            in_use_connections: in_use,
            queued_requests: state.waiters.len(),
            created: counters.created,
            acquired: counters.acquired,
            released: counters.released,
            queued: counters.queued,
            timeouts: counters.timeouts,
            errors: counters.errors,
            utilization: PoolStats::format_utilization(in_use, state.total),
            collected_at: Utc::now(),
        }
    }

    /// Zeroes every counter except `created`.
    pub fn reset_stats(&self) {
        let mut state = self.inner.state.lock();
        state.counters = PoolCounters {
            created: state.counters.created,
            ..PoolCounters::default()
        };
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionPool")
            .field("config", &self.inner.config)
            .field("total", &state.total)
            .field("available", &state.available.len())
            .field("waiters", &state.waiters.len())
            .field("closed", &state.closed)
            .finish()
    }
}

fn spawn_sweeper(inner: &Arc<PoolInner>) {
    let (Some(idle_timeout), Some(period)) =
        (inner.config.idle_timeout, inner.config.sweep_interval())
    else {
        return;
    };

    let pool: Weak<PoolInner> = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(inner) = pool.upgrade() else { break };
            let Some(retired) = inner.retire_idle(idle_timeout) else { break };
            drop(inner);

            if retired.is_empty() {
                continue;
            }

            info!(retired = retired.len(), "Closing idle connections");
            for checkout in retired {
                match checkout.handle.close().await {
                    Ok(()) => debug!(connection_id = checkout.id, "Idle connection closed"),
                    Err(error) => {
                        warn!(connection_id = checkout.id, error = %error, "Failed to close idle connection")
                    }
                }
            }
        }
    });

    *inner.sweeper.lock() = Some(handle);
}

/// A caller's place in the wait queue.
///
/// Dropping it before it settles removes the ticket from the queue, or returns a handle
/// that was already passed to it.
struct QueuedRequest {
    inner: Arc<PoolInner>,
    ticket: u64,
    rx: oneshot::Receiver<Checkout>,
    settled: bool,
}

impl QueuedRequest {
    async fn wait(&mut self, limit: Duration) -> Result<Checkout, PoolError> {
        let outcome = timeout(limit, &mut self.rx).await;
        self.settled = true;

        match outcome {
            Ok(Ok(checkout)) => Ok(checkout),
            // Sender dropped: the pool shut down.
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => {
                let mut state = self.inner.state.lock();
                if state.remove_waiter(self.ticket) {
                    state.counters.timeouts += 1;
                    drop(state);
                    warn!(
                        ticket = self.ticket,
                        waited_ms = limit.as_millis() as u64,
                        "Timed out waiting for a database connection"
                    );
                    return Err(PoolError::QueueTimeout(limit));
                }
                drop(state);

                // Handed over (or rejected) between the deadline and taking the lock.
                self.rx.try_recv().map_err(|_| PoolError::Closed)
            }
        }
    }
}

impl Drop for QueuedRequest {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        if self.inner.state.lock().remove_waiter(self.ticket) {
            debug!(ticket = self.ticket, "Abandoned queued connection request");
            return;
        }

        if let Ok(checkout) = self.rx.try_recv() {
            self.inner.release(checkout);
        }
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Dereferences to the underlying [`SqliteConnection`]. Dropping it returns the handle
/// to the pool it came from.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    checkout: Option<Checkout>,
    id: u64,
    created_at: DateTime<Utc>,
    acquired_at: Instant,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, checkout: Checkout) -> Self {
        Self {
            pool,
            id: checkout.id,
            created_at: checkout.created_at,
            checkout: Some(checkout),
            acquired_at: Instant::now(),
        }
    }

    /// Pool-local identifier of the underlying handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// How long this caller has held the connection.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Deref for PooledConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self
            .checkout
            .as_ref()
            .expect("BUG: PooledConnection used after return to pool")
            .handle
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .checkout
            .as_mut()
            .expect("BUG: PooledConnection used after return to pool")
            .handle
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(checkout) = self.checkout.take() {
            self.pool.release(checkout);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("held_for", &self.held_for())
            .finish()
    }
}
