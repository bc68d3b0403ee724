//! DuckDB storage backend implementation.
//!
//! Each index lives in its own table:
//!
//! ```sql
//! CREATE TABLE <index> (
//!     outer_key VARCHAR NOT NULL,
//!     inner_key VARCHAR NOT NULL,
//!     value     VARCHAR NOT NULL,
//!     PRIMARY KEY (outer_key, inner_key)
//! )
//! ```
//!
//! Upserts are a single `INSERT ... ON CONFLICT DO UPDATE` statement. All
//! tables opened from one backend share its connection, serialized by a
//! mutex, so every statement is atomic with respect to every other.
//!
//! # Configuration
//!
//! ```toml
//! [engine]
//! engine = "duckdb"
//! connection = ":memory:"  # Use ":memory:" for in-memory or file path
//! options = {
//!     threads = "4"        # Optional: Number of threads
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use async_trait::async_trait;
use duckdb::{params, Config, Connection};
use tokio::sync::Mutex;
use crate::storage::{GroupedStore, StoreError};

/// DuckDB-based grouped-map storage.
#[derive(Clone)]
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl DuckDbBackend {
    /// Opens a database and returns a backend not yet bound to a table.
    ///
    /// Call [`with_table`](Self::with_table) to get a usable index.
    pub fn open(connection_string: &str, options: &HashMap<String, String>) -> Result<Self, StoreError> {
        let mut config = Config::default();
        if let Some(threads) = options.get("threads") {
            let threads: i64 = threads
                .parse()
                .map_err(|_| StoreError::Config(format!("invalid threads option: {}", threads)))?;
            config = config.threads(threads)?;
        }

        let conn = Connection::open_with_flags(connection_string, config)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(connection = connection_string, "duckdb opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: String::new(),
        })
    }

    /// Creates a new DuckDB backend with an in-memory database.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:", &HashMap::new())
    }

    /// A handle on `table` sharing this backend's connection.
    pub fn with_table(&self, table: &str) -> Result<Self, StoreError> {
        if !is_identifier(table) {
            return Err(StoreError::Config(format!("invalid index name: {:?}", table)));
        }
        Ok(Self {
            conn: self.conn.clone(),
            table: table.to_string(),
        })
    }

    fn bound_table(&self) -> Result<&str, StoreError> {
        if self.table.is_empty() {
            Err(StoreError::Config("backend is not bound to an index".to_string()))
        } else {
            Ok(&self.table)
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl GroupedStore for DuckDbBackend {
    async fn init(&self) -> Result<(), StoreError> {
        let table = self.bound_table()?;
        let conn = self.conn.lock().await;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                outer_key VARCHAR NOT NULL,
                inner_key VARCHAR NOT NULL,
                value VARCHAR NOT NULL,
                PRIMARY KEY (outer_key, inner_key)
            );
            "#
        ))
        .map_err(|e| StoreError::Backend(format!("Failed to create table {}: {}", table, e)))?;
        Ok(())
    }

    async fn upsert(&self, outer: &str, inner: &str, value: &str) -> Result<(), StoreError> {
        let table = self.bound_table()?;
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            r#"
            INSERT INTO {table} (outer_key, inner_key, value) VALUES (?, ?, ?)
            ON CONFLICT (outer_key, inner_key) DO UPDATE SET value = EXCLUDED.value
            "#
        ))?;
        stmt.execute(params![outer, inner, value])?;
        Ok(())
    }

    async fn get_group(&self, outer: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let table = self.bound_table()?;
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT inner_key, value FROM {table} WHERE outer_key = ?"
        ))?;
        let rows = stmt.query_map(params![outer], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut group = BTreeMap::new();
        for row in rows {
            let (inner, value) = row?;
            group.insert(inner, value);
        }
        Ok(group)
    }

    async fn list_outer_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let table = self.bound_table()?;
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!("SELECT DISTINCT outer_key FROM {table}"))?;
        let rows = stmt.query_map(params![], |row| row.get::<_, String>(0))?;

        let mut keys = BTreeSet::new();
        for row in rows {
            keys.insert(row?);
        }
        Ok(keys)
    }

    async fn delete(&self, outer: &str) -> Result<bool, StoreError> {
        let table = self.bound_table()?;
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            &format!("DELETE FROM {table} WHERE outer_key = ?"),
            params![outer],
        )?;
        Ok(removed > 0)
    }
}
