//! A minimal in-process RESP-2 server used only by this crate's tests.
//!
//! Grounded on the teacher's `sqlx-test` crate providing shared fixtures for
//! exercising a driver without a live database server (per SPEC_FULL.md
//! §6): a background thread accepts loopback connections and answers just
//! enough of the Redis command set to exercise `RedisConnection` and the
//! generic pool end-to-end.

#![cfg(test)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::resp::{self, Reply};

#[derive(Default)]
struct Store {
    strings: HashMap<String, Vec<u8>>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    sets: HashMap<String, HashSet<Vec<u8>>>,
    zsets: HashMap<String, Vec<(Vec<u8>, f64)>>,
    ttls: HashMap<String, i64>,
}

impl Store {
    fn forget(&mut self, key: &str) {
        self.strings.remove(key);
        self.lists.remove(key);
        self.hashes.remove(key);
        self.sets.remove(key);
        self.zsets.remove(key);
        self.ttls.remove(key);
    }

    fn key_exists(&self, key: &str) -> bool {
        self.strings.contains_key(key)
            || self.lists.contains_key(key)
            || self.hashes.contains_key(key)
            || self.sets.contains_key(key)
            || self.zsets.contains_key(key)
    }
}

/// A running mock server. Dropping it does not stop the background thread
/// (tests are short-lived processes), but each test binds an ephemeral
/// port so instances never collide.
pub(crate) struct MockServer {
    pub(crate) addr: std::net::SocketAddr,
}

pub(crate) fn spawn() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind mock redis listener");
    let addr = listener.local_addr().unwrap();
    let store = Arc::new(Mutex::new(Store::default()));

    thread::Builder::new()
        .name("dbc-kv-mock-redis".into())
        .spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let store = Arc::clone(&store);
                thread::spawn(move || handle_client(stream, store));
            }
        })
        .expect("failed to spawn mock redis acceptor thread");

    MockServer { addr }
}

fn handle_client(stream: TcpStream, store: Arc<Mutex<Store>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut writer = BufWriter::new(stream);

    loop {
        let command = match resp::read_command(&mut reader) {
            Ok(Some(args)) if !args.is_empty() => args,
            Ok(Some(_)) => continue,
            Ok(None) => return,
            Err(_) => return,
        };

        let reply = dispatch(&command, &store);
        if resp::write_reply(&mut writer, &reply).is_err() {
            return;
        }
    }
}

/// Decodes one positional argument as text — used only for key names,
/// field names and numeric literals, never for a value blob.
fn arg_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn dispatch(args: &[Vec<u8>], store: &Arc<Mutex<Store>>) -> Reply {
    let name = arg_str(&args[0]).to_ascii_uppercase();
    let mut store = store.lock().expect("mock redis store poisoned");

    match name.as_str() {
        "PING" => Reply::Status("PONG".into()),
        "AUTH" | "SELECT" => Reply::Status("OK".into()),
        "CLIENT" => Reply::Status("OK".into()),
        "FLUSHDB" => {
            *store = Store::default();
            Reply::Status("OK".into())
        }
        "INFO" => Reply::Bulk(Some(b"redis_version:mock\r\nrole:master\r\n".to_vec())),

        "SET" => {
            let key = arg_str(&args[1]);
            store.forget(&key);
            store.strings.insert(key.clone(), args[2].clone());
            if let Some(pos) = args.iter().position(|a| a.eq_ignore_ascii_case(b"EX")) {
                if let Some(seconds) = args.get(pos + 1).map(|a| arg_str(a)).and_then(|s| s.parse().ok()) {
                    store.ttls.insert(key, seconds);
                }
            }
            Reply::Status("OK".into())
        }
        "GET" => Reply::Bulk(store.strings.get(&arg_str(&args[1])).cloned()),
        "EXISTS" => Reply::Integer(store.key_exists(&arg_str(&args[1])) as i64),
        "DEL" => {
            let mut deleted = 0;
            for key in &args[1..] {
                let key = arg_str(key);
                if store.key_exists(&key) {
                    store.forget(&key);
                    deleted += 1;
                }
            }
            Reply::Integer(deleted)
        }
        "EXPIRE" => {
            let key = arg_str(&args[1]);
            if store.key_exists(&key) {
                store.ttls.insert(key, arg_str(&args[2]).parse().unwrap_or(0));
                Reply::Integer(1)
            } else {
                Reply::Integer(0)
            }
        }
        "TTL" => {
            let key = arg_str(&args[1]);
            if !store.key_exists(&key) {
                Reply::Integer(-2)
            } else {
                Reply::Integer(*store.ttls.get(&key).unwrap_or(&-1))
            }
        }
        "INCRBY" | "DECRBY" => {
            let key = arg_str(&args[1]);
            let delta: i64 = arg_str(&args[2]).parse().unwrap_or(0);
            let delta = if name == "DECRBY" { -delta } else { delta };
            let current: i64 = store
                .strings
                .get(&key)
                .and_then(|v| std::str::from_utf8(v).ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let updated = current + delta;
            store.strings.insert(key, updated.to_string().into_bytes());
            Reply::Integer(updated)
        }

        "LPUSH" | "RPUSH" => {
            let key = arg_str(&args[1]);
            let list = store.lists.entry(key).or_default();
            for value in &args[2..] {
                if name == "LPUSH" {
                    list.push_front(value.clone());
                } else {
                    list.push_back(value.clone());
                }
            }
            Reply::Integer(list.len() as i64)
        }
        "LPOP" => Reply::Bulk(
            store
                .lists
                .get_mut(&arg_str(&args[1]))
                .and_then(|list| list.pop_front()),
        ),
        "RPOP" => Reply::Bulk(
            store
                .lists
                .get_mut(&arg_str(&args[1]))
                .and_then(|list| list.pop_back()),
        ),
        "LRANGE" => {
            let list = store.lists.get(&arg_str(&args[1])).cloned().unwrap_or_default();
            let (start, stop) = normalize_range(
                arg_str(&args[2]).parse().unwrap_or(0),
                arg_str(&args[3]).parse().unwrap_or(-1),
                list.len(),
            );
            Reply::Array(Some(
                list.into_iter()
                    .skip(start)
                    .take(stop.saturating_sub(start) + 1)
                    .map(|v| Reply::Bulk(Some(v)))
                    .collect(),
            ))
        }
        "LLEN" => Reply::Integer(store.lists.get(&arg_str(&args[1])).map(VecDeque::len).unwrap_or(0) as i64),

        "HSET" => {
            let key = arg_str(&args[1]);
            let field = arg_str(&args[2]);
            let is_new = !store
                .hashes
                .get(&key)
                .is_some_and(|h| h.contains_key(&field));
            store
                .hashes
                .entry(key)
                .or_default()
                .insert(field, args[3].clone());
            Reply::Integer(is_new as i64)
        }
        "HGET" => Reply::Bulk(
            store
                .hashes
                .get(&arg_str(&args[1]))
                .and_then(|h| h.get(&arg_str(&args[2])))
                .cloned(),
        ),
        "HDEL" => Reply::Integer(
            store
                .hashes
                .get_mut(&arg_str(&args[1]))
                .map(|h| h.remove(&arg_str(&args[2])).is_some())
                .unwrap_or(false) as i64,
        ),
        "HEXISTS" => Reply::Integer(
            store
                .hashes
                .get(&arg_str(&args[1]))
                .is_some_and(|h| h.contains_key(&arg_str(&args[2]))) as i64,
        ),
        "HGETALL" => {
            let empty = HashMap::new();
            let hash = store.hashes.get(&arg_str(&args[1])).unwrap_or(&empty);
            let mut items = Vec::with_capacity(hash.len() * 2);
            for (field, value) in hash {
                items.push(Reply::Bulk(Some(field.clone().into_bytes())));
                items.push(Reply::Bulk(Some(value.clone())));
            }
            Reply::Array(Some(items))
        }
        "HLEN" => Reply::Integer(store.hashes.get(&arg_str(&args[1])).map(HashMap::len).unwrap_or(0) as i64),

        "SADD" => {
            let inserted = store
                .sets
                .entry(arg_str(&args[1]))
                .or_default()
                .insert(args[2].clone());
            Reply::Integer(inserted as i64)
        }
        "SREM" => Reply::Integer(
            store
                .sets
                .get_mut(&arg_str(&args[1]))
                .map(|s| s.remove(args[2].as_slice()))
                .unwrap_or(false) as i64,
        ),
        "SISMEMBER" => Reply::Integer(
            store
                .sets
                .get(&arg_str(&args[1]))
                .is_some_and(|s| s.contains(args[2].as_slice())) as i64,
        ),
        "SMEMBERS" => Reply::Array(Some(
            store
                .sets
                .get(&arg_str(&args[1]))
                .into_iter()
                .flatten()
                .map(|m| Reply::Bulk(Some(m.clone())))
                .collect(),
        )),
        "SCARD" => Reply::Integer(store.sets.get(&arg_str(&args[1])).map(HashSet::len).unwrap_or(0) as i64),

        "ZADD" => {
            let key = arg_str(&args[1]);
            let score: f64 = arg_str(&args[2]).parse().unwrap_or(0.0);
            let member = args[3].clone();
            let zset = store.zsets.entry(key).or_default();
            let is_new = !zset.iter().any(|(m, _)| *m == member);
            zset.retain(|(m, _)| *m != member);
            zset.push((member, score));
            zset.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            Reply::Integer(is_new as i64)
        }
        "ZREM" => {
            let key = arg_str(&args[1]);
            let member = args[2].as_slice();
            let before = store.zsets.get(&key).map(Vec::len).unwrap_or(0);
            if let Some(zset) = store.zsets.get_mut(&key) {
                zset.retain(|(m, _)| m != member);
            }
            let after = store.zsets.get(&key).map(Vec::len).unwrap_or(0);
            Reply::Integer((before != after) as i64)
        }
        "ZSCORE" => Reply::Bulk(
            store
                .zsets
                .get(&arg_str(&args[1]))
                .and_then(|z| z.iter().find(|(m, _)| *m == args[2]))
                .map(|(_, score)| score.to_string().into_bytes()),
        ),
        "ZRANGE" => {
            let zset = store.zsets.get(&arg_str(&args[1])).cloned().unwrap_or_default();
            let (start, stop) = normalize_range(
                arg_str(&args[2]).parse().unwrap_or(0),
                arg_str(&args[3]).parse().unwrap_or(-1),
                zset.len(),
            );
            Reply::Array(Some(
                zset.into_iter()
                    .skip(start)
                    .take(stop.saturating_sub(start) + 1)
                    .map(|(member, _)| Reply::Bulk(Some(member)))
                    .collect(),
            ))
        }
        "ZCARD" => Reply::Integer(store.zsets.get(&arg_str(&args[1])).map(Vec::len).unwrap_or(0) as i64),

        "SCAN" => {
            let pattern = args
                .iter()
                .position(|a| a.eq_ignore_ascii_case(b"MATCH"))
                .and_then(|i| args.get(i + 1))
                .map(|a| arg_str(a))
                .unwrap_or_else(|| "*".to_string());
            let mut keys: Vec<String> = Vec::new();
            keys.extend(store.strings.keys().cloned());
            keys.extend(store.lists.keys().cloned());
            keys.extend(store.hashes.keys().cloned());
            keys.extend(store.sets.keys().cloned());
            keys.extend(store.zsets.keys().cloned());
            keys.retain(|k| glob_match(&pattern, k));
            Reply::Array(Some(vec![
                Reply::Bulk(Some(b"0".to_vec())),
                Reply::Array(Some(
                    keys.into_iter().map(|k| Reply::Bulk(Some(k.into_bytes()))).collect(),
                )),
            ]))
        }

        other => Reply::Error(format!("ERR unknown command '{other}'")),
    }
}

fn normalize_range(start: i64, stop: i64, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |i: i64| -> i64 {
        let i = if i < 0 { (len + i).max(0) } else { i };
        i.min(len.saturating_sub(1)).max(0)
    };
    if len == 0 {
        return (0, 0);
    }
    (clamp(start) as usize, clamp(stop) as usize)
}

/// A tiny `*`/`?`-only glob matcher, sufficient for `scanKeys`'s cursor
/// completeness law without pulling in a pattern-matching crate just for
/// the test fixture.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}
