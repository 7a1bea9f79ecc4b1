//! The pool's shared state and algorithms.
//!
//! Grounded on `original_source/.../core/kv/kv_db_connection_pool.cpp`'s
//! `KVDBConnectionPool`: the borrow (`getKVDBConnection`/`getIdleDBConnection`),
//! return (`returnConnection`), maintenance (`maintenanceTask`) and shutdown
//! (`close`/destructor) algorithms are translated here nearly statement for
//! statement, substituting the C++ original's `shared_ptr`-reused wrapper
//! for a recycled physical [`Entry`] (see `DESIGN.md`'s wrapper-reuse Open
//! Question) and its `std::jthread` + `std::condition_variable` maintenance
//! loop for `std::thread` + [`Condvar`].
//!
//! Lock order, enforced mechanically by [`SharedPool::lock_all_idle`] being
//! the only place `mx_all` and `mx_idle` are ever held together: `mx_borrow`
//! < `mx_return` < `mx_all` < `mx_idle` < `mx_maintenance`. No function ever
//! acquires a lock out of this order; nothing below calls another locking
//! function while already holding one of these.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::uri::ConnectionUri;

use super::options::PoolConfig;

/// A physical connection plus the timestamps the maintenance thread needs.
///
/// This, not [`super::PooledConnection`], is the unit the pool recycles: a
/// borrow pops (or creates) an `Entry` and wraps it in a freshly constructed
/// [`super::PooledConnection`]; a return unwraps it back out. See
/// `DESIGN.md`'s wrapper-reuse Open Question.
pub(crate) struct Entry<D: Driver> {
    pub(crate) conn: D::Connection,
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
}

impl<D: Driver> Entry<D> {
    fn new(conn: D::Connection) -> Self {
        let now = Instant::now();
        Entry {
            conn,
            created_at: now,
            last_used_at: now,
        }
    }
}

pub(crate) struct SharedPool<D: Driver> {
    driver: D,
    uri: ConnectionUri,
    config: PoolConfig,

    mx_borrow: Mutex<()>,
    mx_return: Mutex<()>,
    mx_all: Mutex<u32>,
    mx_idle: Mutex<VecDeque<Entry<D>>>,
    mx_maintenance: Mutex<()>,
    maintenance_condition: Condvar,

    running: AtomicBool,
    active_connections: AtomicU32,
}

impl<D: Driver> SharedPool<D> {
    /// Builds the pool and, if the caller wants it up and running
    /// immediately, eagerly opens `config.initial_size()` connections and
    /// spawns the maintenance thread. Grounded on `KVDBConnectionPool::create`
    /// + `initializePool`.
    pub(crate) fn new(driver: D, mut uri: ConnectionUri, config: PoolConfig) -> Result<std::sync::Arc<Self>> {
        for (key, value) in config.options() {
            uri.insert_option(key.clone(), value.clone());
        }
        uri.insert_option(
            "validation_timeout_ms".to_string(),
            config.validation_timeout().as_millis().to_string(),
        );

        let pool = std::sync::Arc::new(SharedPool {
            driver,
            uri,
            config,
            mx_borrow: Mutex::new(()),
            mx_return: Mutex::new(()),
            mx_all: Mutex::new(0),
            mx_idle: Mutex::new(VecDeque::new()),
            mx_maintenance: Mutex::new(()),
            maintenance_condition: Condvar::new(),
            running: AtomicBool::new(true),
            active_connections: AtomicU32::new(0),
        });

        {
            let (mut total, mut idle) = pool.lock_all_idle();
            for _ in 0..pool.config.initial_size() {
                let entry = pool.create_entry()?;
                *total += 1;
                idle.push_back(entry);
            }
        }

        let weak = std::sync::Arc::downgrade(&pool);
        std::thread::Builder::new()
            .name("dbc-pool-maintenance".into())
            .spawn(move || maintenance_loop::<D>(weak))
            .expect("failed to spawn pool maintenance thread");

        log::info!("pool created for {:?} (scheme {:?})", pool.uri.as_str(), pool.uri.scheme());

        Ok(pool)
    }

    pub(crate) fn uri(&self) -> &ConnectionUri {
        &self.uri
    }

    /// The single designated place `mx_all` and `mx_idle` are acquired
    /// together, always in that order, so the lock order is mechanical
    /// rather than relying on every call site getting it right.
    fn lock_all_idle(&self) -> (MutexGuard<'_, u32>, MutexGuard<'_, VecDeque<Entry<D>>>) {
        let total = self.mx_all.lock().expect("pool mx_all poisoned");
        let idle = self.mx_idle.lock().expect("pool mx_idle poisoned");
        (total, idle)
    }

    fn create_entry(&self) -> Result<Entry<D>> {
        log::debug!("pool: opening new physical connection to {:?}", self.uri.as_str());
        let conn = self.driver.connect(&self.uri)?;
        Ok(Entry::new(conn))
    }

    fn validate(&self, conn: &mut D::Connection) -> bool {
        if conn.is_closed() {
            return false;
        }
        let command = self.config.validation_command().unwrap_or("");
        match conn.validate_with(command) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("pool: connection failed validation: {e}");
                false
            }
        }
    }

    /// Pops an idle entry, validating it (if `test_on_borrow`) and
    /// transparently replacing it with a fresh connection when invalid.
    /// Returns `Ok(None)` when the idle queue is empty — the caller should
    /// then try [`SharedPool::try_grow`]. Grounded on `getIdleDBConnection`.
    fn try_idle(&self) -> Result<Option<Entry<D>>> {
        let (mut total, mut idle) = self.lock_all_idle();

        let Some(mut entry) = idle.pop_front() else {
            return Ok(None);
        };

        if self.config.test_on_borrow() && !self.validate(&mut entry.conn) {
            let _ = entry.conn.close();
            *total = total.saturating_sub(1);

            if !self.running.load(Ordering::SeqCst) {
                return Ok(None);
            }

            return match self.create_entry() {
                Ok(replacement) => {
                    *total += 1;
                    Ok(Some(replacement))
                }
                Err(e) => {
                    log::warn!("pool: failed to replace invalid idle connection: {e}");
                    Ok(None)
                }
            };
        }

        Ok(Some(entry))
    }

    /// Opens a brand-new connection if the pool has room, re-checking
    /// capacity after the (possibly slow) connect so concurrent growers
    /// never push the pool past `max_size`. Grounded on the
    /// create-then-recheck-under-lock shape of `getKVDBConnection`.
    fn try_grow(&self) -> Result<Option<Entry<D>>> {
        {
            let total = self.mx_all.lock().expect("pool mx_all poisoned");
            if *total >= self.config.max_size() {
                return Ok(None);
            }
        }

        let entry = self.create_entry()?;

        let mut total = self.mx_all.lock().expect("pool mx_all poisoned");
        if *total < self.config.max_size() {
            *total += 1;
            Ok(Some(entry))
        } else {
            let mut entry = entry;
            let _ = entry.conn.close();
            Ok(None)
        }
    }

    /// Borrows a physical connection, waiting up to `max_wait` for one to
    /// free up. Grounded on `getKVDBConnection`.
    pub(crate) fn borrow(&self) -> Result<Entry<D>> {
        let _borrow_guard = self.mx_borrow.lock().expect("pool mx_borrow poisoned");

        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::PoolClosed);
        }

        if let Some(entry) = self.try_idle()? {
            self.active_connections.fetch_add(1, Ordering::SeqCst);
            return Ok(entry);
        }

        if let Some(entry) = self.try_grow()? {
            self.active_connections.fetch_add(1, Ordering::SeqCst);
            return Ok(entry);
        }

        let wait_start = Instant::now();
        loop {
            std::thread::sleep(Duration::from_millis(10));

            if !self.running.load(Ordering::SeqCst) {
                return Err(Error::PoolClosed);
            }
            if !self.config.max_wait().is_zero() && wait_start.elapsed() >= self.config.max_wait() {
                return Err(Error::Timeout);
            }

            if let Some(entry) = self.try_idle()? {
                self.active_connections.fetch_add(1, Ordering::SeqCst);
                return Ok(entry);
            }
            if let Some(entry) = self.try_grow()? {
                self.active_connections.fetch_add(1, Ordering::SeqCst);
                return Ok(entry);
            }
        }
    }

    /// Returns a borrowed entry to the pool. Grounded on `returnConnection`.
    pub(crate) fn release(&self, mut entry: Entry<D>) {
        let _return_guard = self.mx_return.lock().expect("pool mx_return poisoned");

        if !self.running.load(Ordering::SeqCst) {
            let _ = entry.conn.close();
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        let valid = if self.config.test_on_return() {
            self.validate(&mut entry.conn)
        } else {
            true
        };

        if valid {
            entry.last_used_at = Instant::now();
            let (_total, mut idle) = self.lock_all_idle();
            idle.push_back(entry);
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
        } else {
            {
                let mut total = self.mx_all.lock().expect("pool mx_all poisoned");
                *total = total.saturating_sub(1);
            }
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            let _ = entry.conn.close();

            if self.running.load(Ordering::SeqCst) {
                match self.create_entry() {
                    Ok(replacement) => {
                        let (mut total, mut idle) = self.lock_all_idle();
                        *total += 1;
                        idle.push_back(replacement);
                    }
                    Err(e) => {
                        log::warn!("pool: failed to replace invalid returned connection: {e}");
                    }
                }
            }
        }

        let _guard = self.mx_maintenance.lock().expect("pool mx_maintenance poisoned");
        self.maintenance_condition.notify_one();
    }

    /// One maintenance sweep: prunes idle connections past `idle_timeout`
    /// or `max_lifetime` (never below `min_idle`), then tops the idle queue
    /// back up to `min_idle`. Grounded on `maintenanceTask`'s per-wake body.
    fn maintenance_pass(&self) {
        let now = Instant::now();
        let (mut total, mut idle) = self.lock_all_idle();

        let mut kept = VecDeque::with_capacity(idle.len());
        while let Some(mut entry) = idle.pop_front() {
            let idle_for = now.duration_since(entry.last_used_at);
            let alive_for = now.duration_since(entry.created_at);
            let expired = self.config.idle_timeout().is_some_and(|t| idle_for > t)
                || self.config.max_lifetime().is_some_and(|t| alive_for > t);

            if expired && *total > self.config.min_idle() {
                *total = total.saturating_sub(1);
                let _ = entry.conn.close();
            } else {
                kept.push_back(entry);
            }
        }
        *idle = kept;

        while self.running.load(Ordering::SeqCst) && *total < self.config.min_idle() {
            match self.create_entry() {
                Ok(entry) => {
                    *total += 1;
                    idle.push_back(entry);
                }
                Err(e) => {
                    log::warn!("pool maintenance: failed to top up idle connections: {e}");
                    break;
                }
            }
        }
    }

    /// Idempotent: a second call is a no-op. Grounded on `close`/the
    /// destructor, which share the same `m_running.exchange(false)` guard.
    pub(crate) fn shutdown(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if !was_running {
            return;
        }

        log::info!("pool shutting down for {:?}", self.uri.as_str());

        let wait_start = Instant::now();
        while self.active_connections.load(Ordering::SeqCst) > 0 {
            if wait_start.elapsed() > Duration::from_secs(10) {
                self.active_connections.store(0, Ordering::SeqCst);
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        {
            let _guard = self.mx_maintenance.lock().expect("pool mx_maintenance poisoned");
            self.maintenance_condition.notify_all();
        }

        let (mut total, mut idle) = self.lock_all_idle();
        while let Some(mut entry) = idle.pop_front() {
            let _ = entry.conn.close();
        }
        *total = 0;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn stats(&self) -> super::PoolStats {
        let total = *self.mx_all.lock().expect("pool mx_all poisoned");
        let idle = self.mx_idle.lock().expect("pool mx_idle poisoned").len() as u32;
        super::PoolStats {
            total,
            idle,
            active: self.active_connections.load(Ordering::SeqCst),
        }
    }
}

impl<D: Driver> Drop for SharedPool<D> {
    fn drop(&mut self) {
        // Notify-only: the maintenance thread holds a `Weak`, never a
        // strong reference, so it cannot be the one running this `drop`
        // (see DESIGN.md's destructor-time dispatch Open Question). We
        // don't join it here — it exits on its own once it observes
        // `running == false`, avoiding any risk of a thread joining itself.
        self.shutdown();
    }
}

fn maintenance_loop<D: Driver>(pool: Weak<SharedPool<D>>) {
    loop {
        let Some(strong) = pool.upgrade() else {
            return;
        };

        let interval = strong.config.maintenance_interval();
        let guard = strong
            .mx_maintenance
            .lock()
            .expect("pool mx_maintenance poisoned");
        let (_guard, _timed_out) = strong
            .maintenance_condition
            .wait_timeout_while(guard, interval, |_| strong.running.load(Ordering::SeqCst))
            .expect("pool mx_maintenance poisoned");
        drop(_guard);

        if !strong.running.load(Ordering::SeqCst) {
            return;
        }

        strong.maintenance_pass();
    }
}
