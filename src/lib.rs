//! A unified, connection-pooled database client.
//!
//! This crate re-exports the generic pool and driver contract from
//! [`dbc_core`], plus whichever backend adapters are enabled via Cargo
//! features: [`dbc_kv`] for a Redis-style key-value store, `dbc-relational`
//! for a relational engine, and `dbc-document` for a document store. Only
//! the `kv` feature ships a fully wire-protocol-capable adapter; the
//! relational and document features exercise the same pool and connection
//! contract against in-process mock engines.

pub use dbc_core::connection::{Connection, DocumentConnection, KvConnection, RelationalConnection};
pub use dbc_core::driver::{self, Driver};
pub use dbc_core::error::{Error, Result};
pub use dbc_core::isolation::IsolationLevel;
pub use dbc_core::pool::{Pool, PoolConfig, PoolStats, PooledConnection};
pub use dbc_core::uri::ConnectionUri;

#[cfg(feature = "kv")]
pub use dbc_kv as kv;

#[cfg(feature = "relational")]
pub use dbc_relational as relational;

#[cfg(feature = "document")]
pub use dbc_document as document;

/// Registers the default drivers compiled into this build with the
/// process-wide [`driver`] registry.
///
/// Mirrors the teacher's `sqlx::any::install_default_drivers`: applications
/// that only ever connect through one backend crate directly never need to
/// call this, but anything that dispatches on a connection URL at runtime
/// must call it once before the first [`driver::connect`].
pub fn install_default_drivers() {
    #[cfg(feature = "kv")]
    dbc_kv::install();

    #[cfg(feature = "relational")]
    dbc_relational::install();

    #[cfg(feature = "document")]
    dbc_document::install();
}
