//! Backend-agnostic core: connection/driver contracts, URI parsing, and the
//! generic, thread-based connection pool every `dbc-*` backend crate builds
//! on.
//!
//! Grounded on `sqlx-core`'s split between a runtime-agnostic core crate
//! and thin per-backend crates, generalized from sqlx's async/`Driver`-per-
//! database-engine model to one pool generic over any [`driver::Driver`]
//! implementation, whether it fronts a key-value, relational, or document
//! store.

pub mod blob;
pub mod connection;
pub mod driver;
pub mod error;
pub mod isolation;
pub mod pool;
pub mod uri;

pub use error::{Error, Result};
