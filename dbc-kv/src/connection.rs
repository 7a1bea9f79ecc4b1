//! `RedisConnection`: one TCP transport serializing RESP-2 commands.
//!
//! Construction order, reply-decoding rules and the full operation surface
//! are grounded on `original_source/.../driver_redis.cpp`'s `RedisConnection`
//! constructor and method bodies.

use std::any::Any;
use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use dbc_core::connection::{Connection, KvConnection};
use dbc_core::error::{Error, Result};
use dbc_core::uri::ConnectionUri;

use crate::resp::{self, Reply};

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

pub struct RedisConnection {
    writer: BufWriter<TcpStream>,
    reader: BufReader<TcpStream>,
    url: String,
    closed: bool,
    pooled: bool,
}

impl RedisConnection {
    pub(crate) fn open(uri: &ConnectionUri) -> Result<Self> {
        let host = uri.host();
        let port = uri.port_or(DEFAULT_PORT);
        let db = uri.db_index_or(0)?;

        let connect_timeout_ms = uri
            .option("connect_timeout")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS as i64) as u64;

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(Error::from)?
            .next()
            .ok_or_else(|| Error::InvalidUri(format!("cannot resolve host {host:?}").into()))?;

        let stream = TcpStream::connect_timeout(&addr, Duration::from_millis(connect_timeout_ms))
            .map_err(Error::from)?;
        stream.set_nodelay(true).map_err(Error::from)?;

        let writer = BufWriter::new(stream.try_clone().map_err(Error::from)?);
        let reader = BufReader::new(stream);

        let mut conn = RedisConnection {
            writer,
            reader,
            url: uri.as_str().to_string(),
            closed: false,
            pooled: false,
        };

        if let Some(password) = uri.password().filter(|p| !p.is_empty()) {
            match uri.user() {
                Some(user) if !user.is_empty() => conn.str_command(&["AUTH", user, password])?,
                _ => conn.str_command(&["AUTH", password])?,
            };
        }

        if db > 0 {
            conn.str_command(&["SELECT", &db.to_string()])?;
        }

        if let Some(client_name) = uri.option("client_name") {
            conn.str_command(&["CLIENT", "SETNAME", client_name])?;
        }

        Ok(conn)
    }

    /// Sends one command and returns its decoded reply. An error reply is
    /// turned into `Err`: `NOAUTH`/`WRONGPASS`-prefixed messages become
    /// [`Error::Auth`], anything else [`Error::Command`]. Arguments are
    /// raw bytes end to end, the same binary safety RESP itself has
    /// (`resp::write_command` never assumes UTF-8).
    fn command(&mut self, args: &[&[u8]]) -> Result<Reply> {
        if self.closed {
            return Err(Error::InvalidState("connection is closed".into()));
        }
        if let Err(e) = resp::write_command(&mut self.writer, args) {
            self.closed = true;
            return Err(Error::from(e));
        }
        let reply = match resp::read_reply(&mut self.reader) {
            Ok(reply) => reply,
            Err(e) => {
                self.closed = true;
                return Err(e);
            }
        };
        match reply {
            Reply::Error(msg) if msg.starts_with("NOAUTH") || msg.starts_with("WRONGPASS") => {
                Err(Error::Auth(msg.into()))
            }
            Reply::Error(msg) => Err(Error::Command(msg.into())),
            other => Ok(other),
        }
    }

    /// Convenience over [`Self::command`] for the many commands whose
    /// arguments are all known to be plain text (key names, subcommands,
    /// counters) and never an arbitrary value blob.
    fn str_command(&mut self, args: &[&str]) -> Result<Reply> {
        let argv: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
        self.command(&argv)
    }

    fn str_command_owned(&mut self, args: Vec<String>) -> Result<Reply> {
        let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
        self.str_command(&borrowed)
    }
}

impl Connection for RedisConnection {
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
        self.str_command(&["PING"]).map(|_| ())
    }

    /// Splits `command` on whitespace and issues it as a real RESP command
    /// (e.g. the configured `validation_command`), rather than always
    /// hardcoding `PING` — an empty command falls back to [`Self::ping`].
    fn validate_with(&mut self, command: &str) -> Result<()> {
        let words: Vec<&str> = command.split_whitespace().collect();
        if words.is_empty() {
            return self.ping();
        }
        self.str_command(&words).map(|_| ())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl KvConnection for RedisConnection {
    fn set(&mut self, key: &str, value: &[u8], expiry_seconds: Option<i64>) -> Result<()> {
        match expiry_seconds {
            Some(seconds) => {
                let seconds = seconds.to_string();
                let argv: Vec<&[u8]> = vec![b"SET", key.as_bytes(), value, b"EX", seconds.as_bytes()];
                self.command(&argv)?;
            }
            None => {
                let argv: Vec<&[u8]> = vec![b"SET", key.as_bytes(), value];
                self.command(&argv)?;
            }
        };
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.str_command(&["GET", key])?.into_bulk())
    }

    fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.str_command(&["EXISTS", key])?.into_integer() > 0)
    }

    fn delete(&mut self, keys: &[&str]) -> Result<u64> {
        let mut args = vec!["DEL"];
        args.extend_from_slice(keys);
        Ok(self.str_command(&args)?.into_integer().max(0) as u64)
    }

    fn expire(&mut self, key: &str, seconds: i64) -> Result<bool> {
        Ok(self
            .str_command(&["EXPIRE", key, &seconds.to_string()])?
            .into_integer()
            > 0)
    }

    fn ttl(&mut self, key: &str) -> Result<i64> {
        Ok(self.str_command(&["TTL", key])?.into_integer())
    }

    fn increment(&mut self, key: &str, by: i64) -> Result<i64> {
        Ok(self.str_command(&["INCRBY", key, &by.to_string()])?.into_integer())
    }

    fn decrement(&mut self, key: &str, by: i64) -> Result<i64> {
        Ok(self.str_command(&["DECRBY", key, &by.to_string()])?.into_integer())
    }

    fn list_push_left(&mut self, key: &str, value: &[u8]) -> Result<u64> {
        let argv: Vec<&[u8]> = vec![b"LPUSH", key.as_bytes(), value];
        Ok(self.command(&argv)?.into_integer().max(0) as u64)
    }

    fn list_push_right(&mut self, key: &str, value: &[u8]) -> Result<u64> {
        let argv: Vec<&[u8]> = vec![b"RPUSH", key.as_bytes(), value];
        Ok(self.command(&argv)?.into_integer().max(0) as u64)
    }

    fn list_pop_left(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.str_command(&["LPOP", key])?.into_bulk())
    }

    fn list_pop_right(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.str_command(&["RPOP", key])?.into_bulk())
    }

    fn list_range(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let reply = self.str_command(&["LRANGE", key, &start.to_string(), &stop.to_string()])?;
        Ok(reply
            .into_array()
            .into_iter()
            .filter_map(Reply::into_bulk)
            .collect())
    }

    fn list_length(&mut self, key: &str) -> Result<u64> {
        Ok(self.str_command(&["LLEN", key])?.into_integer().max(0) as u64)
    }

    fn hash_set(&mut self, key: &str, field: &str, value: &[u8]) -> Result<bool> {
        let argv: Vec<&[u8]> = vec![b"HSET", key.as_bytes(), field.as_bytes(), value];
        Ok(self.command(&argv)?.into_integer() > 0)
    }

    fn hash_get(&mut self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.str_command(&["HGET", key, field])?.into_bulk())
    }

    fn hash_delete(&mut self, key: &str, field: &str) -> Result<bool> {
        Ok(self.str_command(&["HDEL", key, field])?.into_integer() > 0)
    }

    fn hash_exists(&mut self, key: &str, field: &str) -> Result<bool> {
        Ok(self.str_command(&["HEXISTS", key, field])?.into_integer() > 0)
    }

    fn hash_get_all(&mut self, key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let items = self.str_command(&["HGETALL", key])?.into_array();
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            let field = field.into_string_lossy();
            let value = value.into_bulk().unwrap_or_default();
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    fn hash_length(&mut self, key: &str) -> Result<u64> {
        Ok(self.str_command(&["HLEN", key])?.into_integer().max(0) as u64)
    }

    fn set_add(&mut self, key: &str, member: &[u8]) -> Result<bool> {
        let argv: Vec<&[u8]> = vec![b"SADD", key.as_bytes(), member];
        Ok(self.command(&argv)?.into_integer() > 0)
    }

    fn set_remove(&mut self, key: &str, member: &[u8]) -> Result<bool> {
        let argv: Vec<&[u8]> = vec![b"SREM", key.as_bytes(), member];
        Ok(self.command(&argv)?.into_integer() > 0)
    }

    fn set_is_member(&mut self, key: &str, member: &[u8]) -> Result<bool> {
        let argv: Vec<&[u8]> = vec![b"SISMEMBER", key.as_bytes(), member];
        Ok(self.command(&argv)?.into_integer() > 0)
    }

    fn set_members(&mut self, key: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .str_command(&["SMEMBERS", key])?
            .into_array()
            .into_iter()
            .filter_map(Reply::into_bulk)
            .collect())
    }

    fn set_size(&mut self, key: &str) -> Result<u64> {
        Ok(self.str_command(&["SCARD", key])?.into_integer().max(0) as u64)
    }

    fn sorted_set_add(&mut self, key: &str, score: f64, member: &[u8]) -> Result<bool> {
        let score = score.to_string();
        let argv: Vec<&[u8]> = vec![b"ZADD", key.as_bytes(), score.as_bytes(), member];
        self.command(&argv)?;
        Ok(true)
    }

    fn sorted_set_remove(&mut self, key: &str, member: &[u8]) -> Result<bool> {
        let argv: Vec<&[u8]> = vec![b"ZREM", key.as_bytes(), member];
        Ok(self.command(&argv)?.into_integer() > 0)
    }

    fn sorted_set_score(&mut self, key: &str, member: &[u8]) -> Result<Option<f64>> {
        let argv: Vec<&[u8]> = vec![b"ZSCORE", key.as_bytes(), member];
        let bulk = self.command(&argv)?.into_bulk();
        Ok(bulk.and_then(|bytes| std::str::from_utf8(&bytes).ok()?.parse::<f64>().ok()))
    }

    fn sorted_set_range(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let reply = self.str_command(&["ZRANGE", key, &start.to_string(), &stop.to_string()])?;
        Ok(reply
            .into_array()
            .into_iter()
            .filter_map(Reply::into_bulk)
            .collect())
    }

    fn sorted_set_size(&mut self, key: &str) -> Result<u64> {
        Ok(self.str_command(&["ZCARD", key])?.into_integer().max(0) as u64)
    }

    fn scan_keys(&mut self, pattern: &str, count: i64) -> Result<Vec<String>> {
        let mut cursor = "0".to_string();
        let mut keys = Vec::new();
        loop {
            let reply = self.str_command_owned(vec![
                "SCAN".to_string(),
                cursor.clone(),
                "MATCH".to_string(),
                pattern.to_string(),
                "COUNT".to_string(),
                count.to_string(),
            ])?;
            let mut items = reply.into_array().into_iter();
            let next_cursor = items
                .next()
                .map(Reply::into_string_lossy)
                .unwrap_or_else(|| "0".to_string());
            for item in items.next().map(Reply::into_array).unwrap_or_default() {
                keys.push(item.into_string_lossy());
            }
            cursor = next_cursor;
            if cursor == "0" {
                break;
            }
        }
        Ok(keys)
    }

    fn execute_command(&mut self, command: &str, args: &[&str]) -> Result<String> {
        let mut argv = vec![command];
        argv.extend_from_slice(args);
        Ok(self.str_command(&argv)?.into_string_lossy())
    }

    fn flush_db(&mut self, asynchronous: bool) -> Result<()> {
        if asynchronous {
            self.str_command(&["FLUSHDB", "ASYNC"])?;
        } else {
            self.str_command(&["FLUSHDB"])?;
        }
        Ok(())
    }

    fn server_info(&mut self) -> Result<Vec<(String, String)>> {
        let text = self.str_command(&["INFO"])?.into_string_lossy();
        Ok(text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }
}
