//! The connection contract shared by every backend, plus the typed
//! sub-contracts for key-value, relational and document backends.

use std::any::Any;

use crate::blob::Blob;
use crate::error::Result;
use crate::isolation::IsolationLevel;

/// Operations every physical connection supports regardless of backend.
///
/// Implementors are the `Driver::Connection` associated type; the pool
/// never calls anything outside this trait on a connection it hasn't yet
/// downcast to a typed sub-contract.
pub trait Connection: Any + Send {
    /// Closes the underlying transport. Idempotent: calling it twice must
    /// not error or panic.
    fn close(&mut self) -> Result<()>;

    /// Whether [`Connection::close`] has already run.
    fn is_closed(&self) -> bool;

    /// Whether this connection was obtained from a pool (as opposed to a
    /// direct, unpooled `connect`).
    fn is_pooled(&self) -> bool;

    /// The URI this connection was constructed from, for diagnostics and
    /// log redaction.
    fn url(&self) -> &str;

    /// A lightweight liveness check used by the pool's validation step.
    /// Distinct from a backend-specific `ping` command: implementations
    /// should use whatever is cheapest (e.g. checking a cached "last
    /// error" flag) rather than always issuing a round trip.
    fn ping(&mut self) -> Result<()>;

    /// Validates liveness using `command` as the configured health probe
    /// (spec §4.4's `PING`/`SELECT 1`/ping-equivalent, surfaced as
    /// [`crate::pool::PoolConfig::validation_command`]). The default
    /// ignores `command` and falls back to [`Connection::ping`], for
    /// backends (document stores) whose validation probe has no free-text
    /// form to execute; backends with an actual command surface (KV,
    /// relational) override this to run `command` for real.
    fn validate_with(&mut self, command: &str) -> Result<()> {
        let _ = command;
        self.ping()
    }

    /// Upcasts to `&dyn Any` so the pool can downcast once to a typed
    /// sub-contract on adoption.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `&mut dyn Any`, for the same reason.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Operations exposed by a relational (SQL-style) connection.
///
/// `prepare` returns a [`PreparedStatement`] handle carrying the owned SQL
/// text; `execute_prepared`/`query_prepared` run it with fresh parameters
/// any number of times, mirroring spec §6's `prepareStatement(sql)` plus
/// the execute/query pair, without a server-side prepared-statement id
/// since no wire protocol backs this trait's implementations in this crate.
pub trait RelationalConnection: Connection {
    /// Executes a statement with positional parameters, returning the
    /// number of rows affected.
    fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64>;

    /// Executes a query, returning the matched rows.
    fn query(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>>;

    /// Validates `sql` and returns a reusable handle for
    /// [`RelationalConnection::execute_prepared`]/
    /// [`RelationalConnection::query_prepared`].
    fn prepare(&mut self, sql: &str) -> Result<PreparedStatement>;

    fn execute_prepared(&mut self, stmt: &PreparedStatement, params: &[Param]) -> Result<u64> {
        self.execute(stmt.sql(), params)
    }

    fn query_prepared(&mut self, stmt: &PreparedStatement, params: &[Param]) -> Result<Vec<Row>> {
        self.query(stmt.sql(), params)
    }

    /// Begins a transaction at the given isolation level.
    fn begin(&mut self, isolation: IsolationLevel) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Whether a transaction opened by [`RelationalConnection::begin`] is
    /// still open (neither committed nor rolled back).
    fn transaction_active(&self) -> bool;

    /// Sets whether each statement implicitly commits on its own,
    /// matching the JDBC-style `setAutoCommit` spec §6 asks for. Turning
    /// auto-commit on while a transaction is active commits it first.
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    fn auto_commit(&self) -> bool;

    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<()>;

    fn transaction_isolation(&self) -> IsolationLevel;
}

/// A validated, reusable SQL statement handle returned by
/// [`RelationalConnection::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    sql: String,
}

impl PreparedStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        PreparedStatement { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Operations exposed by a key-value (Redis-style) connection.
///
/// Mirrors `original_source`'s `KVDBConnection` surface (see `dbc-kv`'s
/// `DESIGN.md` entry): basic key/value, counters, list, hash, set, sorted
/// set, scan and server operations, each backed by one implementation
/// shared by whatever throwing/non-throwing API a caller prefers — here,
/// simply `Result<T, Error>`.
pub trait KvConnection: Connection {
    fn set(&mut self, key: &str, value: &[u8], expiry_seconds: Option<i64>) -> Result<()>;
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;
    fn exists(&mut self, key: &str) -> Result<bool>;
    fn delete(&mut self, keys: &[&str]) -> Result<u64>;
    fn expire(&mut self, key: &str, seconds: i64) -> Result<bool>;
    fn ttl(&mut self, key: &str) -> Result<i64>;
    fn increment(&mut self, key: &str, by: i64) -> Result<i64>;
    fn decrement(&mut self, key: &str, by: i64) -> Result<i64>;

    fn list_push_left(&mut self, key: &str, value: &[u8]) -> Result<u64>;
    fn list_push_right(&mut self, key: &str, value: &[u8]) -> Result<u64>;
    fn list_pop_left(&mut self, key: &str) -> Result<Option<Vec<u8>>>;
    fn list_pop_right(&mut self, key: &str) -> Result<Option<Vec<u8>>>;
    fn list_range(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>>;
    fn list_length(&mut self, key: &str) -> Result<u64>;

    fn hash_set(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool>;
    fn hash_get(&mut self, key: &str, field: &str) -> Result<Option<Vec<u8>>>;
    fn hash_delete(&mut self, key: &str, field: &str) -> Result<bool>;
    fn hash_exists(&mut self, key: &str, field: &str) -> Result<bool>;
    fn hash_get_all(&mut self, key: &str) -> Result<Vec<(String, Vec<u8>)>>;
    fn hash_length(&mut self, key: &str) -> Result<u64>;

    fn set_add(&mut self, key: &str, member: &[u8]) -> Result<bool>;
    fn set_remove(&mut self, key: &str, member: &[u8]) -> Result<bool>;
    fn set_is_member(&mut self, key: &str, member: &[u8]) -> Result<bool>;
    fn set_members(&mut self, key: &str) -> Result<Vec<Vec<u8>>>;
    fn set_size(&mut self, key: &str) -> Result<u64>;

    fn sorted_set_add(&mut self, key: &str, score: f64, member: &[u8]) -> Result<bool>;
    fn sorted_set_remove(&mut self, key: &str, member: &[u8]) -> Result<bool>;
    fn sorted_set_score(&mut self, key: &str, member: &[u8]) -> Result<Option<f64>>;
    fn sorted_set_range(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>>;
    fn sorted_set_size(&mut self, key: &str) -> Result<u64>;

    /// Scans the full keyspace for keys matching `pattern`, internally
    /// looping the backend's cursor protocol until it returns to `0`.
    /// `count` is a per-iteration hint only.
    fn scan_keys(&mut self, pattern: &str, count: i64) -> Result<Vec<String>>;

    fn execute_command(&mut self, command: &str, args: &[&str]) -> Result<String>;
    fn flush_db(&mut self, asynchronous: bool) -> Result<()>;
    fn server_info(&mut self) -> Result<Vec<(String, String)>>;
}

/// Operations exposed by a document-store (MongoDB-style) connection.
///
/// Collection management (`create_collection`/`drop_collection`/
/// `list_collections`/`collection_exists`) lives directly on the
/// connection, mirroring `getCollection` plus the catalog operations of
/// spec §6; the per-collection CRUD/aggregate operations take the
/// collection name as their first argument rather than returning a
/// separate handle type, since every implementation in this crate is a
/// single in-process store with no server-side cursor or session to pin a
/// handle to.
pub trait DocumentConnection: Connection {
    fn create_collection(&mut self, collection: &str) -> Result<()>;
    fn drop_collection(&mut self, collection: &str) -> Result<()>;
    fn list_collections(&mut self) -> Result<Vec<String>>;
    fn collection_exists(&mut self, collection: &str) -> Result<bool>;

    fn insert_one(&mut self, collection: &str, document: &str) -> Result<String>;
    fn find(&mut self, collection: &str, filter: &str) -> Result<Vec<String>>;
    fn update_one(&mut self, collection: &str, filter: &str, update: &str) -> Result<u64>;
    fn delete(&mut self, collection: &str, filter: &str) -> Result<u64>;
    fn aggregate(&mut self, collection: &str, pipeline: &str) -> Result<Vec<String>>;
}

/// A positional statement parameter for [`RelationalConnection::execute`]
/// and [`RelationalConnection::query`].
#[derive(Debug, Clone)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Blob),
}

/// A single column value in a returned [`Row`].
///
/// Kept as a small closed enum rather than a `String` so a `Blob` column
/// round-trips byte-for-byte: a lossy stringly-typed `Row` (as the teacher
/// backends' wire decoders never need, since they decode straight into
/// typed Rust values) would fail the spec's BLOB round-trip law whenever
/// the bytes aren't valid UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// The value as text, if it is textual (`Text`) or cheaply
    /// stringifiable (`Bool`/`Int`/`Float`); `None` for `Null`/`Blob`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<&Param> for Value {
    fn from(param: &Param) -> Self {
        match param {
            Param::Null => Value::Null,
            Param::Bool(b) => Value::Bool(*b),
            Param::Int(n) => Value::Int(*n),
            Param::Float(f) => Value::Float(*f),
            Param::Text(s) => Value::Text(s.clone()),
            Param::Blob(b) => Value::Blob(b.as_bytes().to_vec()),
        }
    }
}

/// A single returned row: column name to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// The named column's value as text. `None` if the column is absent,
    /// `NULL`, or a `Blob` (use [`Row::get_blob`] for those).
    pub fn get(&self, name: &str) -> Option<String> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .and_then(|(_, v)| v.as_text())
    }

    pub fn get_blob(&self, name: &str) -> Option<&[u8]> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .and_then(|(_, v)| v.as_blob())
    }
}
