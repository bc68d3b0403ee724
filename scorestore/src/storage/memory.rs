//! In-process memory backend.
//!
//! Holds each index as nested hash maps behind a `tokio::sync::RwLock`, so
//! readers run concurrently and every write is serialized. Nothing survives
//! a restart.

use crate::storage::{GroupedStore, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Groups = HashMap<String, HashMap<String, String>>;

/// Memory-resident grouped map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    groups: Arc<RwLock<Groups>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupedStore for MemoryBackend {
    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, outer: &str, inner: &str, value: &str) -> Result<(), StoreError> {
        let mut groups = self.groups.write().await;
        groups
            .entry(outer.to_string())
            .or_default()
            .insert(inner.to_string(), value.to_string());
        Ok(())
    }

    async fn get_group(&self, outer: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups
            .get(outer)
            .map(|group| group.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn list_outer_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups.keys().cloned().collect())
    }

    async fn delete(&self, outer: &str) -> Result<bool, StoreError> {
        let mut groups = self.groups.write().await;
        Ok(groups.remove(outer).is_some())
    }
}
