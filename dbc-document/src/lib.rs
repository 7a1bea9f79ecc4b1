//! The document-store backend for `dbc`: a `DocumentConnection`
//! implementation exercised against an in-process mock engine rather than a
//! real MongoDB wire protocol (out of scope per spec §1).

pub mod connection;
pub mod driver;
mod engine;

pub use connection::MockDocumentConnection;
pub use driver::MockDriver;

use dbc_core::pool::{Builder, Pool, PoolConfig};

/// A connection pool fronting the in-process mock document engine.
pub type DocPool = Pool<MockDriver>;

/// [`PoolConfig::builder`] pre-seeded with the document backend's
/// defaults: `validation_command = "ping"` per spec §6's validation-command
/// default table (MongoDB's own `ping` administrative command).
pub fn pool_config_builder() -> Builder {
    PoolConfig::builder().validation_command("ping")
}

pub fn connect_pool(url: &str, config: PoolConfig) -> dbc_core::error::Result<DocPool> {
    Pool::connect(MockDriver::new(), url, config)
}

/// Registers [`MockDriver`] with the process-wide driver registry for the
/// `mongodb://` scheme.
pub fn install() {
    dbc_core::driver::register(MockDriver::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbc_core::connection::DocumentConnection;

    fn test_pool(db_name: &str) -> DocPool {
        let _ = env_logger::try_init();
        connect_pool(
            &format!("mongodb://localhost/{db_name}"),
            pool_config_builder().initial_size(1).max_size(4).build(),
        )
        .expect("mock pool should connect")
    }

    #[test]
    fn create_collection_then_list_and_check_exists() {
        let pool = test_pool("catalog");
        let mut conn = pool.acquire().unwrap();

        conn.create_collection("users").unwrap();
        assert!(conn.collection_exists("users").unwrap());
        assert_eq!(conn.list_collections().unwrap(), vec!["users".to_string()]);

        conn.drop_collection("users").unwrap();
        assert!(!conn.collection_exists("users").unwrap());
    }

    #[test]
    fn insert_one_assigns_an_id_when_the_document_omits_one() {
        let pool = test_pool("insert_id");
        let mut conn = pool.acquire().unwrap();

        let id = conn.insert_one("users", r#"{"name": "ada"}"#).unwrap();
        assert!(!id.is_empty());

        let docs = conn.find("users", "{}").unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].contains(&id));
    }

    #[test]
    fn find_matches_on_a_subset_of_fields() {
        let pool = test_pool("find");
        let mut conn = pool.acquire().unwrap();

        conn.insert_one("users", r#"{"name": "ada", "active": true}"#).unwrap();
        conn.insert_one("users", r#"{"name": "grace", "active": false}"#).unwrap();

        let active = conn.find("users", r#"{"active": true}"#).unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].contains("ada"));
    }

    #[test]
    fn update_one_merges_fields_into_the_first_match() {
        let pool = test_pool("update");
        let mut conn = pool.acquire().unwrap();

        conn.insert_one("users", r#"{"name": "ada", "active": false}"#).unwrap();
        let updated = conn
            .update_one("users", r#"{"name": "ada"}"#, r#"{"active": true}"#)
            .unwrap();
        assert_eq!(updated, 1);

        let docs = conn.find("users", r#"{"active": true}"#).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn delete_removes_every_matching_document() {
        let pool = test_pool("delete");
        let mut conn = pool.acquire().unwrap();

        conn.insert_one("users", r#"{"active": false}"#).unwrap();
        conn.insert_one("users", r#"{"active": false}"#).unwrap();
        conn.insert_one("users", r#"{"active": true}"#).unwrap();

        let deleted = conn.delete("users", r#"{"active": false}"#).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(conn.find("users", "{}").unwrap().len(), 1);
    }

    #[test]
    fn aggregate_runs_match_then_count() {
        let pool = test_pool("aggregate");
        let mut conn = pool.acquire().unwrap();

        conn.insert_one("orders", r#"{"status": "shipped"}"#).unwrap();
        conn.insert_one("orders", r#"{"status": "shipped"}"#).unwrap();
        conn.insert_one("orders", r#"{"status": "pending"}"#).unwrap();

        let result = conn
            .aggregate(
                "orders",
                r#"[{"$match": {"status": "shipped"}}, {"$count": "n"}]"#,
            )
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].contains("\"n\":2"));
    }
}
