//! Pool configuration and its builder.
//!
//! Grounded on `sqlx-core/src/pool/options.rs`'s chainable `PoolOptions<DB>`
//! builder, generalized to the pool's own blocking, thread-based defaults
//! (no `acquire_timeout`-as-async-future, no connect callbacks requiring a
//! runtime).

use std::collections::HashMap;
use std::time::Duration;

/// Immutable-after-construction pool configuration.
///
/// Build one with [`PoolConfig::builder`]:
///
/// ```
/// # use dbc_core::pool::PoolConfig;
/// # use std::time::Duration;
/// let config = PoolConfig::builder()
///     .max_size(20)
///     .min_idle(3)
///     .idle_timeout(Duration::from_secs(600))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub(crate) initial_size: u32,
    pub(crate) max_size: u32,
    pub(crate) min_idle: u32,
    pub(crate) max_wait: Duration,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) validation_command: Option<String>,
    pub(crate) validation_timeout: Duration,
    pub(crate) test_on_borrow: bool,
    pub(crate) test_on_return: bool,
    pub(crate) maintenance_interval: Duration,
    pub(crate) options: HashMap<String, String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_size: 0,
            max_size: 10,
            min_idle: 0,
            max_wait: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            validation_command: None,
            validation_timeout: Duration::from_secs(5),
            test_on_borrow: true,
            test_on_return: false,
            maintenance_interval: Duration::from_secs(30),
            options: HashMap::new(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Number of physical connections eagerly opened when the pool is
    /// built, before any caller has borrowed one. Always within
    /// `[min_idle, max_size]` by the time [`Builder::build`] returns.
    pub fn initial_size(&self) -> u32 {
        self.initial_size
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn min_idle(&self) -> u32 {
        self.min_idle
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime
    }

    pub fn validation_command(&self) -> Option<&str> {
        self.validation_command.as_deref()
    }

    /// How long a single validation check (`test_on_borrow`/`test_on_return`/
    /// maintenance sweep) may take before it is treated as a failed check.
    pub fn validation_timeout(&self) -> Duration {
        self.validation_timeout
    }

    pub fn test_on_borrow(&self) -> bool {
        self.test_on_borrow
    }

    pub fn test_on_return(&self) -> bool {
        self.test_on_return
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Every free-form, driver-specific option set via [`Builder::option`],
    /// merged into the connection URI before each `Driver::connect` call.
    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }
}

/// Chainable builder for [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct Builder {
    config: PoolConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            config: PoolConfig::default(),
        }
    }

    /// Number of physical connections to open eagerly when the pool is
    /// built. Clamped at [`Builder::build`] time into `[min_idle, max_size]`.
    pub fn initial_size(mut self, initial_size: u32) -> Self {
        self.config.initial_size = initial_size;
        self
    }

    /// Maximum number of physical connections the pool will ever hold.
    /// Must be at least 1; a `max_size` of 0 would make every
    /// [`crate::pool::Pool::acquire`] call time out forever, so it is
    /// clamped to 1.
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.config.max_size = max_size.max(1);
        self
    }

    /// Minimum number of idle connections the maintenance thread tries to
    /// keep ready. Clamped to `max_size`.
    pub fn min_idle(mut self, min_idle: u32) -> Self {
        self.config.min_idle = min_idle;
        self
    }

    /// How long [`crate::pool::Pool::acquire`] polls for an available
    /// connection before returning [`crate::error::Error::Timeout`]. A
    /// value of `Duration::ZERO` means "wait indefinitely" — the caller
    /// must be able to unblock it by returning some other borrowed
    /// connection to the pool.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    /// How long a connection may sit idle before the maintenance thread
    /// prunes it (while keeping at least `min_idle` around). `None`
    /// disables idle pruning.
    pub fn idle_timeout(mut self, idle_timeout: impl Into<Option<Duration>>) -> Self {
        self.config.idle_timeout = idle_timeout.into();
        self
    }

    /// Maximum age of a physical connection before it is retired on next
    /// return or during maintenance, regardless of use. `None` disables
    /// lifetime-based retirement.
    pub fn max_lifetime(mut self, max_lifetime: impl Into<Option<Duration>>) -> Self {
        self.config.max_lifetime = max_lifetime.into();
        self
    }

    /// Backend-specific command used to validate a connection is alive
    /// (e.g. `"PING"` for KV, `"SELECT 1"` for relational). Backend pool
    /// type aliases set a sensible default; override only to customize.
    pub fn validation_command(mut self, command: impl Into<String>) -> Self {
        self.config.validation_command = Some(command.into());
        self
    }

    /// How long to wait for a validation check to complete before treating
    /// it as a failure. Forwarded to the driver via the connection URI's
    /// option map as `validation_timeout_ms`.
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.config.validation_timeout = timeout;
        self
    }

    /// Validate a connection immediately before handing it to a borrower.
    pub fn test_on_borrow(mut self, test_on_borrow: bool) -> Self {
        self.config.test_on_borrow = test_on_borrow;
        self
    }

    /// Validate a connection when it is returned, before it re-enters the
    /// idle queue.
    pub fn test_on_return(mut self, test_on_return: bool) -> Self {
        self.config.test_on_return = test_on_return;
        self
    }

    /// How often the background maintenance thread wakes to prune/top up
    /// the idle queue, absent an earlier wake from [`crate::pool::Pool::close`].
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance_interval = interval;
        self
    }

    /// A free-form, driver-specific option forwarded to `Driver::connect`
    /// via the connection URI's option map (e.g. `client_name` for KV).
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    pub fn build(mut self) -> PoolConfig {
        self.config.min_idle = self.config.min_idle.min(self.config.max_size);
        self.config.initial_size = self
            .config
            .initial_size
            .clamp(self.config.min_idle, self.config.max_size);
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size(), 10);
        assert_eq!(config.min_idle(), 0);
        assert!(config.test_on_borrow());
        assert!(!config.test_on_return());
    }

    #[test]
    fn min_idle_is_clamped_to_max_size() {
        let config = PoolConfig::builder().max_size(5).min_idle(50).build();
        assert_eq!(config.min_idle(), 5);
    }

    #[test]
    fn max_size_is_clamped_to_at_least_one() {
        let config = PoolConfig::builder().max_size(0).build();
        assert_eq!(config.max_size(), 1);
    }
}
