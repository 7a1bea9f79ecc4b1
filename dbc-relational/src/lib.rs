//! The relational backend for `dbc`: a `RelationalConnection` implementation
//! exercised against an in-process mock engine rather than a real MySQL or
//! PostgreSQL wire protocol (out of scope per spec §1).

pub mod connection;
pub mod driver;
mod engine;

pub use connection::MockConnection;
pub use driver::MockDriver;

use dbc_core::pool::{Builder, Pool, PoolConfig};

/// A connection pool fronting the in-process mock relational engine.
pub type RelPool = Pool<MockDriver>;

/// [`PoolConfig::builder`] pre-seeded with the relational backend's
/// defaults: `validation_command = "SELECT 1"` per spec §6's
/// validation-command default table.
pub fn pool_config_builder() -> Builder {
    PoolConfig::builder().validation_command("SELECT 1")
}

pub fn connect_pool(url: &str, config: PoolConfig) -> dbc_core::error::Result<RelPool> {
    Pool::connect(MockDriver::new(), url, config)
}

/// Registers [`MockDriver`] with the process-wide driver registry for the
/// `mysql://` and `postgresql://` schemes.
pub fn install() {
    dbc_core::driver::register(MockDriver::new());
}
