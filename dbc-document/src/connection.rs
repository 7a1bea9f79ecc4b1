//! `MockDocumentConnection`: a `DocumentConnection` implementation backed
//! by the in-process store in [`crate::engine`], standing in for a
//! MongoDB wire connection (out of scope per spec §1).

use std::any::Any;
use std::sync::{Arc, Mutex};

use dbc_core::connection::{Connection, DocumentConnection};
use dbc_core::error::{Error, Result};
use dbc_core::uri::ConnectionUri;

use crate::engine::{self, Database};

pub struct MockDocumentConnection {
    db: Arc<Mutex<Database>>,
    url: String,
    closed: bool,
    pooled: bool,
}

impl MockDocumentConnection {
    pub(crate) fn open(uri: &ConnectionUri) -> Result<Self> {
        let db_name = uri.path().unwrap_or("default");
        let key = format!("{}:{}/{}", uri.host(), uri.port_or(27017), db_name);
        Ok(MockDocumentConnection {
            db: engine::shared_database(&key),
            url: uri.as_str().to_string(),
            closed: false,
            pooled: false,
        })
    }
}

impl Connection for MockDocumentConnection {
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

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl DocumentConnection for MockDocumentConnection {
    fn create_collection(&mut self, collection: &str) -> Result<()> {
        engine::create_collection(&self.db, collection)
    }

    fn drop_collection(&mut self, collection: &str) -> Result<()> {
        engine::drop_collection(&self.db, collection)
    }

    fn list_collections(&mut self) -> Result<Vec<String>> {
        engine::list_collections(&self.db)
    }

    fn collection_exists(&mut self, collection: &str) -> Result<bool> {
        engine::collection_exists(&self.db, collection)
    }

    fn insert_one(&mut self, collection: &str, document: &str) -> Result<String> {
        engine::insert_one(&self.db, collection, document)
    }

    fn find(&mut self, collection: &str, filter: &str) -> Result<Vec<String>> {
        engine::find(&self.db, collection, filter)
    }

    fn update_one(&mut self, collection: &str, filter: &str, update: &str) -> Result<u64> {
        engine::update_one(&self.db, collection, filter, update)
    }

    fn delete(&mut self, collection: &str, filter: &str) -> Result<u64> {
        engine::delete(&self.db, collection, filter)
    }

    fn aggregate(&mut self, collection: &str, pipeline: &str) -> Result<Vec<String>> {
        engine::aggregate(&self.db, collection, pipeline)
    }
}
