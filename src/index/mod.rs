//! Vector index abstraction and lifecycle types.
//!
//! The pipeline talks to a named similarity index through the
//! [`VectorIndex`] trait. Provisioning is modelled as an explicit tagged
//! outcome ([`EnsureOutcome`]) rather than exception inspection: callers see
//! whether the index already existed or was created on this call, and
//! concurrent creation races collapse to a single logical index.
//!
//! Implementations:
//!
//! * [`memory::MemoryVectorIndex`] — in-process reference implementation,
//!   also the concurrency-safe default for tests and offline development.
//! * [`http::HttpVectorIndex`] — adapter for a remote REST index service.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RagError;

pub use http::HttpVectorIndex;
pub use memory::MemoryVectorIndex;

/// Similarity metric used when an index is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Dot,
    Euclidean,
}

impl Metric {
    /// Parse a configuration string, defaulting to cosine for unknown values.
    pub fn parse_or_cosine(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "dot" | "dotproduct" => Metric::Dot,
            "euclidean" | "l2" => Metric::Euclidean,
            _ => Metric::Cosine,
        }
    }
}

/// Desired shape of an index, supplied by configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

/// Descriptor of a provisioned index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorIndexHandle {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

impl VectorIndexHandle {
    pub fn from_spec(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name.clone(),
            dimension: spec.dimension,
            metric: spec.metric,
        }
    }
}

/// Result of an [`VectorIndex::ensure_index`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The index already existed; no creation was attempted or the provider
    /// reported a duplicate create, which counts as success.
    Existed,
    /// This call created the index.
    Created,
}

/// One entry to upsert into an index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// One nearest-neighbor hit, ordered descending by score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// A named similarity index with idempotent provisioning and upserts.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Ensure an index matching `spec` exists.
    ///
    /// Idempotent and safe to race: at most one creation succeeds per name,
    /// and a provider-side "already exists" is reported as
    /// [`EnsureOutcome::Existed`], not an error.
    async fn ensure_index(
        &self,
        spec: &IndexSpec,
    ) -> Result<(VectorIndexHandle, EnsureOutcome), RagError>;

    /// Insert or overwrite the entry with `entry.id`.
    async fn upsert(&self, handle: &VectorIndexHandle, entry: VectorEntry)
    -> Result<(), RagError>;

    /// Return up to `top_k` nearest neighbors of `vector`, descending by
    /// score, ties broken by most recent upsert first.
    async fn query(
        &self,
        handle: &VectorIndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError>;
}
