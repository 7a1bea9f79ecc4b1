//! A tiny in-process document store shared by every
//! [`crate::connection::MockDocumentConnection`] opened against the same
//! URI, standing in for a MongoDB wire connection (out of scope per
//! spec §1). Documents are stored as parsed `serde_json::Value` objects so
//! filters can do real structural matching instead of string comparison.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use dbc_core::error::{Error, Result};
use serde_json::Value;

#[derive(Default)]
pub(crate) struct Database {
    collections: HashMap<String, Vec<(String, Value)>>,
}

impl Database {
    pub(crate) fn create_collection(&mut self, name: &str) {
        self.collections.entry(name.to_string()).or_default();
    }

    pub(crate) fn drop_collection(&mut self, name: &str) {
        self.collections.remove(name);
    }

    pub(crate) fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn collection_exists(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    fn collection_mut(&mut self, name: &str) -> &mut Vec<(String, Value)> {
        self.collections.entry(name.to_string()).or_default()
    }
}

pub(crate) fn shared_database(key: &str) -> Arc<Mutex<Database>> {
    static DATABASES: OnceLock<Mutex<HashMap<String, Arc<Mutex<Database>>>>> = OnceLock::new();
    let registry = DATABASES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut registry = registry.lock().expect("mock document registry poisoned");
    registry
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(Database::default())))
        .clone()
}

fn next_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("{:024x}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

fn parse_json(label: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(text).map_err(|e| Error::command(format!("malformed {label}: {e}")))
}

/// A document matches `filter` when every key present in `filter` has an
/// equal value in the document (a partial/subset match, the common case
/// for `find`-style equality filters; no operators like `$gt` are
/// supported, per spec §1's "query planning" Non-goal).
fn matches(doc: &Value, filter: &Value) -> bool {
    let (Value::Object(filter), Value::Object(doc)) = (filter, doc) else {
        return filter.is_null();
    };
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

pub(crate) fn create_collection(db: &Arc<Mutex<Database>>, collection: &str) -> Result<()> {
    db.lock().expect("mock document database poisoned").create_collection(collection);
    Ok(())
}

pub(crate) fn drop_collection(db: &Arc<Mutex<Database>>, collection: &str) -> Result<()> {
    db.lock().expect("mock document database poisoned").drop_collection(collection);
    Ok(())
}

pub(crate) fn list_collections(db: &Arc<Mutex<Database>>) -> Result<Vec<String>> {
    Ok(db.lock().expect("mock document database poisoned").list_collections())
}

pub(crate) fn collection_exists(db: &Arc<Mutex<Database>>, collection: &str) -> Result<bool> {
    Ok(db
        .lock()
        .expect("mock document database poisoned")
        .collection_exists(collection))
}

pub(crate) fn insert_one(db: &Arc<Mutex<Database>>, collection: &str, document: &str) -> Result<String> {
    let mut value = parse_json("document", document)?;
    let id = next_id();
    if let Value::Object(obj) = &mut value {
        obj.entry("_id").or_insert_with(|| Value::String(id.clone()));
    }
    let mut db = db.lock().expect("mock document database poisoned");
    db.collection_mut(collection).push((id.clone(), value));
    Ok(id)
}

pub(crate) fn find(db: &Arc<Mutex<Database>>, collection: &str, filter: &str) -> Result<Vec<String>> {
    let filter = parse_json("filter", filter)?;
    let mut db = db.lock().expect("mock document database poisoned");
    Ok(db
        .collection_mut(collection)
        .iter()
        .filter(|(_, doc)| matches(doc, &filter))
        .map(|(_, doc)| doc.to_string())
        .collect())
}

pub(crate) fn update_one(db: &Arc<Mutex<Database>>, collection: &str, filter: &str, update: &str) -> Result<u64> {
    let filter = parse_json("filter", filter)?;
    let update = parse_json("update", update)?;
    let Value::Object(update_fields) = &update else {
        return Err(Error::command("update document must be a JSON object"));
    };

    let mut db = db.lock().expect("mock document database poisoned");
    let collection = db.collection_mut(collection);
    let Some((_, doc)) = collection.iter_mut().find(|(_, doc)| matches(doc, &filter)) else {
        return Ok(0);
    };
    if let Value::Object(doc) = doc {
        for (k, v) in update_fields {
            doc.insert(k.clone(), v.clone());
        }
    }
    Ok(1)
}

pub(crate) fn delete(db: &Arc<Mutex<Database>>, collection: &str, filter: &str) -> Result<u64> {
    let filter = parse_json("filter", filter)?;
    let mut db = db.lock().expect("mock document database poisoned");
    let collection = db.collection_mut(collection);
    let before = collection.len();
    collection.retain(|(_, doc)| !matches(doc, &filter));
    Ok((before - collection.len()) as u64)
}

/// Supports exactly two pipeline stages, enough to exercise the contract
/// end-to-end without a real aggregation planner (Non-goal, spec §1):
/// `[{"$match": {...}}]` filters like `find`, and `[{"$count": "n"}]`
/// returns a single `{"n": <count>}` document.
pub(crate) fn aggregate(db: &Arc<Mutex<Database>>, collection: &str, pipeline: &str) -> Result<Vec<String>> {
    let stages = parse_json("pipeline", pipeline)?;
    let Value::Array(stages) = stages else {
        return Err(Error::command("aggregate pipeline must be a JSON array"));
    };

    let mut db_guard = db.lock().expect("mock document database poisoned");
    let mut docs: Vec<Value> = db_guard.collection_mut(collection).iter().map(|(_, d)| d.clone()).collect();
    drop(db_guard);

    for stage in stages {
        let Value::Object(stage) = &stage else {
            return Err(Error::command("aggregate stage must be a JSON object"));
        };
        if let Some(filter) = stage.get("$match") {
            docs.retain(|doc| matches(doc, filter));
        } else if let Some(Value::String(field)) = stage.get("$count") {
            let count = docs.len();
            docs = vec![serde_json::json!({ field.as_str(): count })];
        } else {
            return Err(Error::command("unsupported aggregation stage"));
        }
    }

    Ok(docs.into_iter().map(|d| d.to_string()).collect())
}
