//! A tiny in-process SQL-like store shared by every [`crate::connection::MockConnection`]
//! opened against the same URI, the way a real MySQL/PostgreSQL server is
//! shared by every client socket connected to it.
//!
//! This is deliberately not a SQL parser: per spec §1's Non-goals ("per-backend
//! SQL construction details... out of scope"), it recognizes four statement
//! shapes by leading keyword and supports exactly the `?` positional
//! placeholder style the pool's `RelationalConnection::execute`/`query`
//! contract uses. It exists to prove the pool, prepared statements,
//! transactions and BLOB round-trips end-to-end without a live server.
//!
//! Recognized statement shapes (case-insensitive keyword, everything else
//! free-form identifiers):
//! - `CREATE TABLE <table> (<col>, <col>, ...)`
//! - `INSERT INTO <table> (<col>, <col>, ...) VALUES (?, ?, ...)`
//! - `SELECT * FROM <table> [WHERE <col> = ?]`, or `SELECT <literal>` with
//!   no `FROM` clause (used as the `SELECT 1` validation probe), which
//!   echoes the literal back as a one-row result instead of erroring
//! - `UPDATE <table> SET <col> = ? [, <col> = ?]* [WHERE <col> = ?]`
//! - `DELETE FROM <table> [WHERE <col> = ?]`

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use dbc_core::connection::{Param, Row, Value};
use dbc_core::error::{Error, Result};

#[derive(Default)]
pub(crate) struct Database {
    tables: HashMap<String, Table>,
}

#[derive(Default, Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Database {
    fn create_table(&mut self, name: &str, columns: Vec<String>) {
        self.tables.entry(name.to_string()).or_insert(Table {
            columns,
            rows: Vec::new(),
        });
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::command(format!("no such table {name:?}")))
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::command(format!("no such table {name:?}")))
    }
}

/// A deep copy of every table's columns and rows, used to implement
/// rollback without a write-ahead log: `begin()` takes a snapshot,
/// `rollback()` restores it, `commit()` just discards it.
pub(crate) type Snapshot = HashMap<String, (Vec<String>, Vec<Vec<Value>>)>;

pub(crate) fn snapshot(db: &Arc<Mutex<Database>>) -> Snapshot {
    db.lock()
        .expect("mock database poisoned")
        .tables
        .iter()
        .map(|(name, table)| (name.clone(), (table.columns.clone(), table.rows.clone())))
        .collect()
}

pub(crate) fn restore(db: &Arc<Mutex<Database>>, snapshot: Snapshot) {
    let mut db = db.lock().expect("mock database poisoned");
    db.tables = snapshot
        .into_iter()
        .map(|(name, (columns, rows))| (name, Table { columns, rows }))
        .collect();
}

/// Returns the shared [`Database`] for `key` (typically `host:port/db`),
/// creating an empty one the first time a connection asks for it.
pub(crate) fn shared_database(key: &str) -> Arc<Mutex<Database>> {
    static DATABASES: OnceLock<Mutex<HashMap<String, Arc<Mutex<Database>>>>> = OnceLock::new();
    let registry = DATABASES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut registry = registry.lock().expect("mock database registry poisoned");
    registry
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(Database::default())))
        .clone()
}

/// A parsed, whitespace-tokenized statement: the keyword plus everything
/// after it, split on top-level whitespace and the punctuation this tiny
/// grammar cares about (`(`, `)`, `,`, `=`).
struct Tokens<'a> {
    words: Vec<&'a str>,
}

fn tokenize(sql: &str) -> Tokens<'_> {
    let mut words = Vec::new();
    let mut start = None;
    let is_boundary = |c: char| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '=');
    for (i, c) in sql.char_indices() {
        if is_boundary(c) {
            if let Some(s) = start.take() {
                words.push(&sql[s..i]);
            }
            if !c.is_whitespace() {
                words.push(&sql[i..i + c.len_utf8()]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(&sql[s..]);
    }
    Tokens { words }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Executes `sql` against `db` with `params` bound to `?` placeholders in
/// order. Returns `(rows_affected, matched_rows)` — `execute` callers use
/// only the former, `query` callers only the latter.
pub(crate) fn run(db: &Arc<Mutex<Database>>, sql: &str, params: &[Param]) -> Result<(u64, Vec<Row>)> {
    let tokens = tokenize(sql);
    let words = &tokens.words;
    if words.is_empty() {
        return Err(Error::command("empty statement"));
    }
    let values: Vec<Value> = params.iter().map(Value::from).collect();
    let keyword = words[0].to_ascii_uppercase();
    let mut db = db.lock().expect("mock database poisoned");

    match keyword.as_str() {
        "CREATE" => {
            // CREATE TABLE <name> ( col , col , ... )
            let table = *words.get(2).ok_or_else(|| Error::command("malformed CREATE TABLE"))?;
            let columns: Vec<String> = words[3..]
                .iter()
                .filter(|w| **w != "(" && **w != ")" && **w != ",")
                .map(|w| w.to_string())
                .collect();
            db.create_table(table, columns);
            Ok((0, Vec::new()))
        }
        "INSERT" => {
            // INSERT INTO <table> ( col , ... ) VALUES ( ? , ... )
            let table_name = *words.get(2).ok_or_else(|| Error::command("malformed INSERT"))?;
            let values_idx = words
                .iter()
                .position(|w| w.eq_ignore_ascii_case("VALUES"))
                .ok_or_else(|| Error::command("INSERT missing VALUES clause"))?;
            let columns: Vec<String> = words[3..values_idx]
                .iter()
                .filter(|w| **w != "(" && **w != ")" && **w != ",")
                .map(|w| w.to_string())
                .collect();

            if values.len() != columns.len() {
                return Err(Error::command(format!(
                    "INSERT column count {} does not match parameter count {}",
                    columns.len(),
                    values.len()
                )));
            }

            let table = db.table_mut(table_name)?;
            if table.columns.is_empty() {
                table.columns = columns;
            }
            table.rows.push(values);
            Ok((1, Vec::new()))
        }
        "SELECT" => {
            // SELECT * FROM <table> [ WHERE <col> = ? ], or a literal
            // scalar select with no FROM clause (e.g. the `SELECT 1`
            // validation probe), which echoes the literal back as a
            // single-row, single-column result instead of erroring.
            let Some(from_idx) = words.iter().position(|w| w.eq_ignore_ascii_case("FROM")) else {
                let literal = words.get(1).copied().unwrap_or("1");
                let value = literal
                    .parse::<i64>()
                    .map(Value::Int)
                    .unwrap_or_else(|_| Value::Text(literal.to_string()));
                return Ok((0, vec![Row { columns: vec![(literal.to_string(), value)] }]));
            };
            let table_name = *words
                .get(from_idx + 1)
                .ok_or_else(|| Error::command("malformed SELECT"))?;
            let table = db.table(table_name)?;

            let filter = parse_where(words, from_idx + 2, table)?;
            let rows = table
                .rows
                .iter()
                .filter(|row| matches_filter(row, &filter, &values))
                .map(|row| Row {
                    columns: table
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect(),
                })
                .collect();
            Ok((0, rows))
        }
        "UPDATE" => {
            // UPDATE <table> SET col = ? [, col = ?]* [WHERE col = ?]
            let table_name = *words.get(1).ok_or_else(|| Error::command("malformed UPDATE"))?;
            let set_idx = words
                .iter()
                .position(|w| w.eq_ignore_ascii_case("SET"))
                .ok_or_else(|| Error::command("UPDATE missing SET clause"))?;
            let where_idx = words.iter().position(|w| w.eq_ignore_ascii_case("WHERE"));
            let set_end = where_idx.unwrap_or(words.len());

            let mut assignments = Vec::new();
            let mut i = set_idx + 1;
            let mut value_cursor = 0;
            while i < set_end {
                let col = words[i].to_string();
                // skip the literal `=` and the `?` placeholder token.
                i += 2;
                if value_cursor >= values.len() {
                    return Err(Error::command("UPDATE has more assignments than parameters"));
                }
                assignments.push((col, values[value_cursor].clone()));
                value_cursor += 1;
                i += 1;
                if i < set_end && words.get(i) == Some(&",") {
                    i += 1;
                }
            }

            let table = db.table_mut(table_name)?;
            let filter = where_idx.map(|idx| parse_where(words, idx, table)).transpose()?;
            let remaining_params = &values[value_cursor..];

            let mut affected = 0u64;
            for row in table.rows.iter_mut() {
                if matches_filter(row, &filter, remaining_params) {
                    for (col, new_value) in &assignments {
                        if let Some(pos) = table.columns.iter().position(|c| c == col) {
                            row[pos] = new_value.clone();
                        }
                    }
                    affected += 1;
                }
            }
            Ok((affected, Vec::new()))
        }
        "DELETE" => {
            // DELETE FROM <table> [WHERE col = ?]
            let from_idx = words
                .iter()
                .position(|w| w.eq_ignore_ascii_case("FROM"))
                .ok_or_else(|| Error::command("DELETE missing FROM clause"))?;
            let table_name = *words
                .get(from_idx + 1)
                .ok_or_else(|| Error::command("malformed DELETE"))?;
            let table = db.table_mut(table_name)?;
            let filter = parse_where(words, from_idx + 2, table)?;

            let before = table.rows.len();
            table.rows.retain(|row| !matches_filter(row, &filter, &values));
            Ok(((before - table.rows.len()) as u64, Vec::new()))
        }
        other => Err(Error::command(format!("unsupported statement keyword {other:?}"))),
    }
}

/// `(column index, placeholder position within params)`, or `None` for an
/// unfiltered statement.
type Filter = Option<usize>;

fn parse_where(words: &[&str], start: usize, table: &Table) -> Result<Filter> {
    if start >= words.len() {
        return Ok(None);
    }
    if !words[start].eq_ignore_ascii_case("WHERE") {
        return Ok(None);
    }
    let col = *words
        .get(start + 1)
        .ok_or_else(|| Error::command("malformed WHERE clause"))?;
    let idx = table
        .columns
        .iter()
        .position(|c| c == col)
        .ok_or_else(|| Error::command(format!("unknown column {col:?} in WHERE clause")))?;
    Ok(Some(idx))
}

fn matches_filter(row: &[Value], filter: &Filter, params: &[Value]) -> bool {
    match filter {
        None => true,
        Some(col_idx) => params
            .first()
            .map(|expected| value_to_string(&row[*col_idx]) == value_to_string(expected))
            .unwrap_or(true),
    }
}
