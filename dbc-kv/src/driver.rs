//! `RedisDriver`: the [`dbc_core::driver::Driver`] implementation fronting
//! [`RedisConnection`].
//!
//! Grounded on `original_source/.../driver_redis.cpp`'s `RedisDriver`
//! (`acceptsURL` scheme prefix check, `getDefaultPort`, `getURIScheme`,
//! `supportsClustering`/`supportsReplication`).

use dbc_core::driver::Driver;
use dbc_core::error::Result;
use dbc_core::uri::ConnectionUri;

use crate::connection::RedisConnection;

#[derive(Debug, Default, Clone, Copy)]
pub struct RedisDriver;

impl RedisDriver {
    pub fn new() -> Self {
        RedisDriver
    }

    /// Always `true`: a single Redis connection's command pipeline does
    /// not speak cluster-redirection or replica-routing protocols, but
    /// nothing about the `KvConnection` contract in this crate rules them
    /// out, mirroring the original's unconditional `true`.
    pub fn supports_clustering(&self) -> bool {
        true
    }

    pub fn supports_replication(&self) -> bool {
        true
    }
}

impl Driver for RedisDriver {
    type Connection = RedisConnection;

    fn name(&self) -> &'static str {
        "redis"
    }

    /// Matched against [`ConnectionUri::scheme`], which has already
    /// stripped any `"dbc:"` library-scheme prefix — `"redis://..."` and
    /// `"dbc:redis://..."` both resolve here.
    fn url_schemes(&self) -> &'static [&'static str] {
        &["redis"]
    }

    fn connect(&self, uri: &ConnectionUri) -> Result<RedisConnection> {
        RedisConnection::open(uri)
    }
}
