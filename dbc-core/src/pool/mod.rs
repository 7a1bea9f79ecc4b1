//! The generic, driver-agnostic connection pool.
//!
//! `Pool<D>` is a thin, `Clone`-able handle around an `Arc<SharedPool<D>>`
//! (grounded on `sqlx-core/src/pool/mod.rs`'s `Pool<DB>(Arc<PoolInner<DB>>)`);
//! the borrow/return/maintenance machinery lives in `inner`, translated from
//! `original_source/.../kv_db_connection_pool.{hpp,cpp}`. See `DESIGN.md`
//! for the Open Questions this module resolves.

mod inner;
mod options;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

pub use options::{Builder, PoolConfig};

use crate::driver::Driver;
use crate::error::Result;
use crate::uri::ConnectionUri;
use inner::{Entry, SharedPool};

/// A snapshot of pool occupancy, returned by [`Pool::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Physical connections currently tracked by the pool (idle + active).
    pub total: u32,
    /// Physical connections sitting idle, ready to be borrowed.
    pub idle: u32,
    /// Physical connections currently checked out by a borrower.
    pub active: u32,
}

/// A handle to a pool of physical connections produced by driver `D`.
///
/// Cloning a `Pool` is cheap (an `Arc` clone) and every clone shares the
/// same underlying connections, idle queue and maintenance thread. The pool
/// keeps running until every `Pool` handle *and* every outstanding
/// [`PooledConnection`] has been dropped — a borrowed connection may
/// legitimately outlive the `Pool` handle that produced it.
pub struct Pool<D: Driver>(Arc<SharedPool<D>>);

impl<D: Driver> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Pool(Arc::clone(&self.0))
    }
}

impl<D: Driver> Pool<D> {
    /// Parses `url`, opens it with `driver`, and builds a pool configured by
    /// `config`. Eagerly opens `config.initial_size()` connections and
    /// starts the maintenance thread before returning, so a pool is either
    /// fully ready or an `Err` — there is no partially-initialized state a
    /// caller can observe.
    pub fn connect(driver: D, url: &str, config: PoolConfig) -> Result<Self> {
        let uri = ConnectionUri::parse(url)?;
        Ok(Pool(SharedPool::new(driver, uri, config)?))
    }

    /// Borrows a connection, waiting up to [`PoolConfig::max_wait`] for one
    /// to become available. Returns [`crate::error::Error::PoolClosed`] if
    /// [`Pool::close`] has already run, or
    /// [`crate::error::Error::Timeout`] if `max_wait` elapses first.
    pub fn acquire(&self) -> Result<PooledConnection<D>> {
        let entry = self.0.borrow()?;
        Ok(PooledConnection {
            entry: Some(entry),
            pool: Arc::clone(&self.0),
        })
    }

    /// A snapshot of current pool occupancy.
    pub fn stats(&self) -> PoolStats {
        self.0.stats()
    }

    /// The URL this pool connects to.
    pub fn url(&self) -> &str {
        self.0.uri().as_str()
    }

    pub fn is_closed(&self) -> bool {
        !self.0.is_running()
    }

    /// Stops accepting new borrows, waits (up to 10s) for active borrows to
    /// be returned, then closes every physical connection. Idempotent: a
    /// second call is a no-op. Connections still checked out when the 10s
    /// grace period elapses are forcibly treated as released so shutdown
    /// cannot hang forever.
    pub fn close(&self) {
        self.0.shutdown();
    }
}

/// A borrowed physical connection.
///
/// Derefs to `D::Connection`, so backend-specific operations (`KvConnection`,
/// `RelationalConnection`, `DocumentConnection`) are called directly through
/// the wrapper. Every mutable access refreshes the connection's
/// last-used timestamp via [`DerefMut::deref_mut`] — which every mutating
/// trait method must go through — rather than re-implementing the refresh
/// in each forwarded operation by hand (grounded on the teacher's blanket
/// `Deref`/`DerefMut` forwarding, `sqlx-core/src/pool/mod.rs`).
///
/// Dropping a `PooledConnection` without calling [`PooledConnection::close`]
/// or [`PooledConnection::return_to_pool`] returns it to the pool, same as
/// an explicit `close()` call.
pub struct PooledConnection<D: Driver> {
    entry: Option<Entry<D>>,
    pool: Arc<SharedPool<D>>,
}

impl<D: Driver> PooledConnection<D> {
    /// Same contract as [`crate::connection::Connection::close`]: if the
    /// pool is still alive, returns the physical connection to it (it is
    /// not actually closed); if the pool has already been closed, closes
    /// the physical connection for real. Idempotent — calling it twice, or
    /// calling it after [`PooledConnection::return_to_pool`], is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.entry.take() {
            Some(entry) if self.pool.is_running() => {
                self.pool.release(entry);
                Ok(())
            }
            Some(mut entry) => entry.conn.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.entry {
            Some(entry) => entry.conn.is_closed(),
            None => true,
        }
    }

    /// Unlike [`PooledConnection::close`], never closes the physical
    /// connection even if the pool is already dead — it is simply dropped,
    /// relying on the connection's own `Drop` to release OS resources.
    /// Grounded on `original_source`'s `returnToPool()`, which (unlike
    /// `close()`) has no `else if (m_conn) { m_conn->close(); }` fallback.
    pub fn return_to_pool(&mut self) {
        if let Some(entry) = self.entry.take() {
            if self.pool.is_running() {
                self.pool.release(entry);
            }
        }
    }

    pub fn is_pooled(&self) -> bool {
        true
    }

    pub fn url(&self) -> &str {
        self.pool.uri().as_str()
    }
}

impl<D: Driver> Deref for PooledConnection<D> {
    type Target = D::Connection;

    fn deref(&self) -> &Self::Target {
        &self
            .entry
            .as_ref()
            .expect("PooledConnection used after close/return_to_pool")
            .conn
    }
}

impl<D: Driver> DerefMut for PooledConnection<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        let entry = self
            .entry
            .as_mut()
            .expect("PooledConnection used after close/return_to_pool");
        entry.last_used_at = Instant::now();
        &mut entry.conn
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        match self.entry.take() {
            Some(entry) if self.pool.is_running() => self.pool.release(entry),
            Some(mut entry) => {
                let _ = entry.conn.close();
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use std::any::Any;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingDriver {
        created: StdArc<AtomicU32>,
    }

    struct CountingConnection {
        url: String,
        closed: bool,
    }

    impl Connection for CountingConnection {
        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
        fn is_closed(&self) -> bool {
            self.closed
        }
        fn is_pooled(&self) -> bool {
            true
        }
        fn url(&self) -> &str {
            &self.url
        }
        fn ping(&mut self) -> Result<()> {
            Ok(())
        }
        fn validate_with(&mut self, command: &str) -> Result<()> {
            if command == "FAIL" {
                return Err(crate::error::Error::command("synthetic validation failure"));
            }
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl Driver for CountingDriver {
        type Connection = CountingConnection;

        fn name(&self) -> &'static str {
            "counting-test-driver"
        }
        fn url_schemes(&self) -> &'static [&'static str] {
            &["counting-test"]
        }
        fn connect(&self, uri: &ConnectionUri) -> Result<CountingConnection> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(CountingConnection {
                url: uri.as_str().to_string(),
                closed: false,
            })
        }
    }

    fn test_driver() -> (CountingDriver, StdArc<AtomicU32>) {
        let created = StdArc::new(AtomicU32::new(0));
        (
            CountingDriver {
                created: created.clone(),
            },
            created,
        )
    }

    #[test]
    fn acquire_reuses_returned_connections_instead_of_growing() {
        let _ = env_logger::try_init();
        let (driver, created) = test_driver();
        let pool = Pool::connect(
            driver,
            "counting-test://localhost",
            PoolConfig::builder().max_size(2).min_idle(0).build(),
        )
        .unwrap();

        {
            let _a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
        }
        let _c = pool.acquire().unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn acquire_beyond_max_size_times_out() {
        let (driver, _created) = test_driver();
        let pool = Pool::connect(
            driver,
            "counting-test://localhost",
            PoolConfig::builder()
                .max_size(1)
                .max_wait(std::time::Duration::from_millis(50))
                .build(),
        )
        .unwrap();

        let _held = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert_eq!(err.code(), "timeout");
    }

    #[test]
    fn configured_validation_command_reaches_the_connection() {
        let (driver, created) = test_driver();
        let pool = Pool::connect(
            driver,
            "counting-test://localhost",
            PoolConfig::builder()
                .max_size(2)
                .initial_size(1)
                .test_on_borrow(true)
                .validation_command("FAIL")
                .build(),
        )
        .unwrap();

        // The eagerly-created idle connection fails the configured "FAIL"
        // probe on first borrow and is transparently replaced, proving the
        // command itself (not just a hardcoded `ping()`) is consulted.
        let _conn = pool.acquire().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn max_wait_zero_blocks_until_a_connection_is_released() {
        let (driver, _created) = test_driver();
        let pool = Pool::connect(
            driver,
            "counting-test://localhost",
            PoolConfig::builder()
                .max_size(1)
                .max_wait(std::time::Duration::ZERO)
                .build(),
        )
        .unwrap();

        let held = pool.acquire().unwrap();
        let waiter_pool = pool.clone();
        let waiter = std::thread::spawn(move || waiter_pool.acquire().unwrap());

        std::thread::sleep(std::time::Duration::from_millis(100));
        drop(held);

        waiter.join().unwrap();
    }

    #[test]
    fn close_then_acquire_returns_pool_closed() {
        let (driver, _created) = test_driver();
        let pool = Pool::connect(driver, "counting-test://localhost", PoolConfig::default()).unwrap();
        pool.close();
        let err = pool.acquire().unwrap_err();
        assert_eq!(err.code(), "pool_closed");
    }

    #[test]
    fn dropping_a_pooled_connection_returns_it_to_the_pool() {
        let (driver, created) = test_driver();
        let pool = Pool::connect(
            driver,
            "counting-test://localhost",
            PoolConfig::builder().max_size(1).build(),
        )
        .unwrap();

        let conn = pool.acquire().unwrap();
        drop(conn);

        assert_eq!(pool.stats().idle, 1);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn return_to_pool_after_pool_closed_does_not_force_close() {
        let (driver, _created) = test_driver();
        let pool = Pool::connect(driver, "counting-test://localhost", PoolConfig::default()).unwrap();
        let mut conn = pool.acquire().unwrap();
        pool.close();
        conn.return_to_pool();
        assert!(conn.entry.is_none());
    }
}
