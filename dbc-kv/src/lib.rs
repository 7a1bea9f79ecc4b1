//! The Redis-style key-value backend for `dbc`.
//!
//! Exposes [`RedisDriver`]/[`RedisConnection`] directly for callers that
//! want a KV-only dependency, plus [`KvPool`], a type alias over
//! [`dbc_core::pool::Pool`] fixing the defaults spec §6 calls for in a KV
//! backend (`validation_command = "PING"`).

pub mod connection;
pub mod driver;
mod resp;

#[cfg(test)]
mod mock_server;

pub use connection::RedisConnection;
pub use driver::RedisDriver;

use dbc_core::pool::{Builder, Pool, PoolConfig};

/// A connection pool fronting one or more Redis-protocol servers.
pub type KvPool = Pool<RedisDriver>;

/// [`PoolConfig::builder`] pre-seeded with the KV backend's defaults:
/// `validation_command = "PING"` (spec §6's validation-command default
/// table), `test_on_borrow = true`. Every other setting is the generic
/// pool default and can still be overridden before calling `.build()`.
pub fn pool_config_builder() -> Builder {
    PoolConfig::builder().validation_command("PING")
}

/// Opens a [`KvPool`] against `url` (`redis://host[:port][/db]`) using
/// `config`, typically built from [`pool_config_builder`].
pub fn connect_pool(url: &str, config: PoolConfig) -> dbc_core::error::Result<KvPool> {
    Pool::connect(RedisDriver::new(), url, config)
}

/// Registers [`RedisDriver`] with the process-wide driver registry
/// (`dbc_core::driver`), so [`dbc_core::driver::connect`] can dispatch
/// `redis://` URLs without the caller depending on this crate's types
/// directly. Idempotent, like every `dbc_core::driver::register` call.
pub fn install() {
    dbc_core::driver::register(RedisDriver::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server;
    use dbc_core::connection::KvConnection;
    use std::time::Duration;

    fn test_pool(server: &mock_server::MockServer) -> KvPool {
        let _ = env_logger::try_init();
        connect_pool(
            &format!("redis://{}", server.addr),
            pool_config_builder()
                .initial_size(2)
                .max_size(4)
                .min_idle(1)
                .max_wait(Duration::from_millis(500))
                .build(),
        )
        .expect("pool should connect to mock server")
    }

    #[test]
    fn borrow_set_get_round_trips_through_the_pool() {
        let server = mock_server::spawn();
        let pool = test_pool(&server);

        let mut conn = pool.acquire().expect("acquire");
        conn.set("greeting", b"hello", None).unwrap();
        assert_eq!(conn.get("greeting").unwrap(), Some(b"hello".to_vec()));
        drop(conn);

        let stats = pool.stats();
        assert_eq!(stats.active, 0);
    }

    #[test]
    fn pool_reports_stats_across_borrow_and_release() {
        let server = mock_server::spawn();
        let pool = test_pool(&server);

        let stats_before = pool.stats();
        assert_eq!(stats_before.active, 0);

        let conn = pool.acquire().unwrap();
        assert_eq!(pool.stats().active, 1);

        drop(conn);
        assert_eq!(pool.stats().active, 0);
    }

    #[test]
    fn values_round_trip_byte_for_byte_even_when_not_valid_utf8() {
        let server = mock_server::spawn();
        let pool = test_pool(&server);
        let mut conn = pool.acquire().expect("acquire");

        let blob: Vec<u8> = (0..=255).collect();
        conn.set("binary", &blob, None).unwrap();
        assert_eq!(conn.get("binary").unwrap(), Some(blob.clone()));

        conn.hash_set("h", "field", &blob).unwrap();
        assert_eq!(conn.hash_get("h", "field").unwrap(), Some(blob.clone()));

        conn.list_push_right("l", &blob).unwrap();
        assert_eq!(conn.list_pop_left("l").unwrap(), Some(blob.clone()));

        conn.set_add("s", &blob).unwrap();
        assert!(conn.set_is_member("s", &blob).unwrap());
        assert_eq!(conn.set_members("s").unwrap(), vec![blob.clone()]);
    }

    #[test]
    fn validation_command_is_issued_as_a_real_command() {
        use dbc_core::connection::Connection;

        let server = mock_server::spawn();
        let pool = test_pool(&server);
        let mut conn = pool.acquire().unwrap();

        conn.validate_with("PING").unwrap();
        conn.validate_with("EXISTS missing-key").unwrap();
        conn.validate_with("").unwrap();
    }

    #[test]
    fn install_registers_the_redis_scheme() {
        install();
        assert!(dbc_core::driver::is_registered("redis"));
    }
}
