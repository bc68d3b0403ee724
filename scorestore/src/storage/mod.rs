//! Storage backends for grouped-map indexes.
//!
//! This module provides two backend implementations:
//! - `memory`: process-local maps behind an async read/write lock
//! - `duckdb`: embedded database, one table per index, in-memory or on disk
//!
//! Each backend implements the `GroupedStore` trait. A grouped map is a
//! two-level mapping, outer key -> (inner key -> value); every single
//! upsert, read or delete is atomic with respect to its outer key, and
//! nothing stronger is promised.

pub mod duckdb;
pub mod memory;

use crate::config::EngineConfig;
use crate::storage::duckdb::DuckDbBackend;
use crate::storage::memory::MemoryBackend;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The engine or index was configured with values it cannot use.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// The backend rejected or failed an operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<::duckdb::Error> for StoreError {
    fn from(err: ::duckdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Grouped-map storage interface.
///
/// Keys and values are plain strings; interpreting them is up to the caller.
#[async_trait]
pub trait GroupedStore: Send + Sync + 'static {
    /// Prepare the backend for use (create tables and the like).
    async fn init(&self) -> Result<(), StoreError>;

    /// Set `inner` to `value` under `outer`, creating `outer` if needed and
    /// overwriting any previous value.
    async fn upsert(&self, outer: &str, inner: &str, value: &str) -> Result<(), StoreError>;

    /// The full inner map of `outer`; empty when `outer` was never written.
    async fn get_group(&self, outer: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Every outer key currently holding at least one entry.
    async fn list_outer_keys(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Remove `outer` and all of its entries. Returns whether it existed.
    async fn delete(&self, outer: &str) -> Result<bool, StoreError>;
}

/// A configured storage engine that hands out named indexes.
///
/// All indexes opened from one engine share its underlying resources
/// (for DuckDB, a single database connection).
#[derive(Clone)]
pub enum StoreEngine {
    Memory,
    DuckDb(DuckDbBackend),
}

impl StoreEngine {
    /// Builds the engine named in `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, StoreError> {
        match config.engine.as_str() {
            "memory" => Ok(StoreEngine::Memory),
            "duckdb" => Ok(StoreEngine::DuckDb(DuckDbBackend::open(
                &config.connection,
                &config.options,
            )?)),
            other => Err(StoreError::Config(format!(
                "unsupported engine type: {}",
                other
            ))),
        }
    }

    /// Opens (and initialises) the index called `name`.
    pub async fn open_index(&self, name: &str) -> Result<Arc<dyn GroupedStore>, StoreError> {
        let store: Arc<dyn GroupedStore> = match self {
            StoreEngine::Memory => Arc::new(MemoryBackend::new()),
            StoreEngine::DuckDb(backend) => Arc::new(backend.with_table(name)?),
        };
        store.init().await?;
        tracing::debug!(index = name, engine = self.name(), "index opened");
        Ok(store)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoreEngine::Memory => "memory",
            StoreEngine::DuckDb(_) => "duckdb",
        }
    }
}
