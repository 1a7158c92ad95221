//! In-process vector index.
//!
//! Serves as the reference implementation of the [`VectorIndex`] contract:
//! provisioning races collapse to one logical index, upserts overwrite by id,
//! and query results order by descending score with most-recent-upsert
//! winning ties.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::instrument;

use super::{EnsureOutcome, IndexSpec, Metric, QueryHit, VectorEntry, VectorIndex,
            VectorIndexHandle};
use crate::errors::RagError;

#[derive(Clone, Debug)]
struct StoredEntry {
    vector: Vec<f32>,
    metadata: serde_json::Value,
    /// Monotonic upsert sequence, used for the recency tie-break.
    seq: u64,
}

#[derive(Debug)]
struct Shard {
    dimension: usize,
    metric: Metric,
    entries: HashMap<String, StoredEntry>,
    next_seq: u64,
}

/// Thread-safe in-memory index keyed by index name.
#[derive(Clone, Default)]
pub struct MemoryVectorIndex {
    shards: Arc<RwLock<HashMap<String, Shard>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held by the named index.
    pub fn len(&self, name: &str) -> usize {
        self.shards
            .read()
            .get(name)
            .map(|shard| shard.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.len(name) == 0
    }
}

fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Dot => dot(a, b),
        Metric::Cosine => {
            let denom = norm(a) * norm(b);
            if denom == 0.0 { 0.0 } else { dot(a, b) / denom }
        }
        // Euclidean distance negated so "higher is more similar" holds for
        // every metric.
        Metric::Euclidean => {
            -a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    #[instrument(skip(self), fields(index = %spec.name))]
    async fn ensure_index(
        &self,
        spec: &IndexSpec,
    ) -> Result<(VectorIndexHandle, EnsureOutcome), RagError> {
        let mut shards = self.shards.write();
        let outcome = if shards.contains_key(&spec.name) {
            EnsureOutcome::Existed
        } else {
            shards.insert(
                spec.name.clone(),
                Shard {
                    dimension: spec.dimension,
                    metric: spec.metric,
                    entries: HashMap::new(),
                    next_seq: 0,
                },
            );
            EnsureOutcome::Created
        };
        Ok((VectorIndexHandle::from_spec(spec), outcome))
    }

    async fn upsert(
        &self,
        handle: &VectorIndexHandle,
        entry: VectorEntry,
    ) -> Result<(), RagError> {
        let mut shards = self.shards.write();
        let shard = shards
            .get_mut(&handle.name)
            .ok_or_else(|| RagError::Consistency(format!("index {} not found", handle.name)))?;
        if entry.vector.len() != shard.dimension {
            return Err(RagError::InvalidInput(format!(
                "vector dimension {} does not match index dimension {}",
                entry.vector.len(),
                shard.dimension
            )));
        }
        let seq = shard.next_seq;
        shard.next_seq += 1;
        shard.entries.insert(
            entry.id,
            StoredEntry {
                vector: entry.vector,
                metadata: entry.metadata,
                seq,
            },
        );
        Ok(())
    }

    async fn query(
        &self,
        handle: &VectorIndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        let shards = self.shards.read();
        let shard = shards
            .get(&handle.name)
            .ok_or_else(|| RagError::Consistency(format!("index {} not found", handle.name)))?;

        let mut scored: Vec<(f32, u64, QueryHit)> = shard
            .entries
            .iter()
            .map(|(id, stored)| {
                let score = score(shard.metric, vector, &stored.vector);
                (
                    score,
                    stored.seq,
                    QueryHit {
                        id: id.clone(),
                        score,
                        metadata: stored.metadata.clone(),
                    },
                )
            })
            .collect();

        // Descending score; equal scores resolve to the most recent upsert.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, _, hit)| hit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> IndexSpec {
        IndexSpec {
            name: "test-index".to_string(),
            dimension: 3,
            metric: Metric::Cosine,
        }
    }

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            vector,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn ensure_index_is_idempotent() {
        let index = MemoryVectorIndex::new();
        let (h1, first) = index.ensure_index(&spec()).await.unwrap();
        let (h2, second) = index.ensure_index(&spec()).await.unwrap();
        assert_eq!(first, EnsureOutcome::Created);
        assert_eq!(second, EnsureOutcome::Existed);
        assert_eq!(h1, h2);
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let index = MemoryVectorIndex::new();
        let (handle, _) = index.ensure_index(&spec()).await.unwrap();
        index
            .upsert(&handle, entry("a", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(&handle, entry("a", vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(index.len("test-index"), 1);

        let hits = index.query(&handle, &[0.0, 1.0, 0.0], 4).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn query_orders_by_score_then_recency() {
        let index = MemoryVectorIndex::new();
        let (handle, _) = index.ensure_index(&spec()).await.unwrap();
        // Two entries with identical vectors tie on score; "newer" wins.
        index
            .upsert(&handle, entry("older", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(&handle, entry("newer", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(&handle, entry("far", vec![0.0, 0.0, 1.0]))
            .await
            .unwrap();

        let hits = index.query(&handle, &[1.0, 0.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older", "far"]);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[tokio::test]
    async fn query_truncates_to_top_k() {
        let index = MemoryVectorIndex::new();
        let (handle, _) = index.ensure_index(&spec()).await.unwrap();
        for i in 0..10 {
            index
                .upsert(&handle, entry(&format!("e{i}"), vec![1.0, 0.0, 0.0]))
                .await
                .unwrap();
        }
        let hits = index.query(&handle, &[1.0, 0.0, 0.0], 4).await.unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let index = MemoryVectorIndex::new();
        let (handle, _) = index.ensure_index(&spec()).await.unwrap();
        let err = index
            .upsert(&handle, entry("bad", vec![1.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn concurrent_ensure_creates_one_index() {
        let index = MemoryVectorIndex::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                index.ensure_index(&spec()).await.unwrap().1
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == EnsureOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}
