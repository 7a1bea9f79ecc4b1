//! `MockConnection`: a `RelationalConnection` implementation backed by the
//! in-process store in [`crate::engine`], standing in for a MySQL/PostgreSQL
//! wire connection (out of scope per spec §1).

use std::any::Any;
use std::sync::{Arc, Mutex};

use dbc_core::connection::{Connection, Param, PreparedStatement, RelationalConnection, Row};
use dbc_core::error::{Error, Result};
use dbc_core::isolation::IsolationLevel;
use dbc_core::uri::ConnectionUri;

use crate::engine::{self, Database};

pub struct MockConnection {
    db: Arc<Mutex<Database>>,
    /// Snapshot of every table taken at `begin()`, restored on `rollback`
    /// and discarded on `commit`/auto-commit. A full-store clone is the
    /// simplest correct undo log for a mock with no write-ahead journal.
    tx_snapshot: Option<engine::Snapshot>,
    auto_commit: bool,
    isolation: IsolationLevel,
    url: String,
    closed: bool,
    pooled: bool,
}

impl MockConnection {
    pub(crate) fn open(uri: &ConnectionUri) -> Result<Self> {
        let db_name = uri.path().unwrap_or("default");
        let key = format!("{}:{}/{}", uri.host(), uri.port_or(5432), db_name);
        Ok(MockConnection {
            db: engine::shared_database(&key),
            tx_snapshot: None,
            auto_commit: true,
            isolation: IsolationLevel::default(),
            url: uri.as_str().to_string(),
            closed: false,
            pooled: false,
        })
    }
}

impl Connection for MockConnection {
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn is_pooled(&self) -> bool {
        self.pooled
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn ping(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("connection is closed"));
        }
        Ok(())
    }

    /// Runs `command` (the configured `validation_command`, e.g.
    /// `"SELECT 1"`) as a real query against the mock engine rather than
    /// always taking the cheap closed-check path; an empty reply is
    /// treated as a failed validation per spec §4.4.
    fn validate_with(&mut self, command: &str) -> Result<()> {
        if command.trim().is_empty() {
            return self.ping();
        }
        let rows = self.query(command, &[])?;
        if rows.is_empty() {
            return Err(Error::ValidationFailed(
                format!("validation command {command:?} returned no rows").into(),
            ));
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

impl RelationalConnection for MockConnection {
    fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        if self.closed {
            return Err(Error::invalid_state("connection is closed"));
        }
        let (affected, _rows) = engine::run(&self.db, sql, params)?;
        Ok(affected)
    }

    fn query(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        if self.closed {
            return Err(Error::invalid_state("connection is closed"));
        }
        let (_affected, rows) = engine::run(&self.db, sql, params)?;
        Ok(rows)
    }

    fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        if sql.trim().is_empty() {
            return Err(Error::command("cannot prepare an empty statement"));
        }
        Ok(PreparedStatement::new(sql))
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        if self.tx_snapshot.is_some() {
            return Err(Error::invalid_state("a transaction is already active"));
        }
        self.isolation = isolation;
        self.tx_snapshot = Some(engine::snapshot(&self.db));
        self.auto_commit = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.tx_snapshot.take().is_none() {
            return Err(Error::invalid_state("no transaction is active"));
        }
        self.auto_commit = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let Some(snapshot) = self.tx_snapshot.take() else {
            return Err(Error::invalid_state("no transaction is active"));
        };
        engine::restore(&self.db, snapshot);
        self.auto_commit = true;
        Ok(())
    }

    fn transaction_active(&self) -> bool {
        self.tx_snapshot.is_some()
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit && self.tx_snapshot.is_some() {
            self.commit()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_transaction_isolation(&mut self, level: IsolationLevel) -> Result<()> {
        self.isolation = level;
        Ok(())
    }

    fn transaction_isolation(&self) -> IsolationLevel {
        self.isolation
    }
}
