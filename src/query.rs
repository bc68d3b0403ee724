//! Read-only queries over the student and exam indexes.

use crate::context::{IndexKind, ServiceContext};
use crate::error::QueryError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One outer key's results together with their mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub results: BTreeMap<String, String>,
    pub average: f64,
}

#[derive(Clone)]
pub struct QueryService {
    ctx: ServiceContext,
}

impl QueryService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Every student or exam that has at least one score.
    pub async fn list_keys(&self, index: IndexKind) -> Result<BTreeSet<String>, QueryError> {
        self.ctx
            .index(index)
            .list_outer_keys()
            .await
            .map_err(|source| QueryError { index, source })
    }

    /// All scores recorded under `key`; empty when `key` has none yet.
    pub async fn get_group(
        &self,
        index: IndexKind,
        key: &str,
    ) -> Result<BTreeMap<String, String>, QueryError> {
        self.ctx
            .index(index)
            .get_group(key)
            .await
            .map_err(|source| QueryError { index, source })
    }

    pub async fn summary(&self, index: IndexKind, key: &str) -> Result<GroupSummary, QueryError> {
        let results = self.get_group(index, key).await?;
        Ok(GroupSummary {
            key: key.to_string(),
            average: average(&results),
            results,
        })
    }
}

/// Arithmetic mean of the scores in `group`, `0.0` when empty.
///
/// Scores are parsed here, at read time. Values that are not decimals are
/// left out of the mean.
pub fn average(group: &BTreeMap<String, String>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (key, value) in group {
        match value.trim().parse::<f64>() {
            Ok(score) if score.is_finite() => {
                sum += score;
                count += 1;
            }
            _ => tracing::warn!(key = %key, value = %value, "skipping non-decimal score"),
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
