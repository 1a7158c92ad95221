//! Remote vector index adapter.
//!
//! Speaks a small REST contract against a managed index service:
//!
//! * `GET  {base}/indexes/{name}` — describe an index (404 when absent).
//! * `POST {base}/indexes` — create an index (409 when it already exists).
//! * `POST {base}/indexes/{name}/vectors` — upsert one entry by id.
//! * `POST {base}/indexes/{name}/query` — nearest-neighbor search.
//!
//! Duplicate creation (409) is success, not error: concurrent provisioning
//! races resolve to one logical index. A 404 on upsert or query after a
//! successful ensure is the provider's eventual-consistency window and maps
//! to [`RagError::Consistency`] so the orchestrator can retry briefly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{EnsureOutcome, IndexSpec, Metric, QueryHit, VectorEntry, VectorIndex,
            VectorIndexHandle};
use crate::errors::RagError;

#[derive(Clone)]
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<QueryHit>,
}

impl HttpVectorIndex {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn unavailable(message: impl Into<String>) -> RagError {
        RagError::ProviderUnavailable {
            provider: "vector index",
            message: message.into(),
        }
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/indexes/{name}", self.base_url)
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    #[instrument(skip(self), fields(index = %spec.name), err)]
    async fn ensure_index(
        &self,
        spec: &IndexSpec,
    ) -> Result<(VectorIndexHandle, EnsureOutcome), RagError> {
        let handle = VectorIndexHandle::from_spec(spec);

        let describe = self
            .client
            .get(self.index_url(&spec.name))
            .send()
            .await
            .map_err(|err| Self::unavailable(err.to_string()))?;

        match describe.status() {
            status if status.is_success() => return Ok((handle, EnsureOutcome::Existed)),
            reqwest::StatusCode::NOT_FOUND => {}
            status => return Err(Self::unavailable(format!("describe status {status}"))),
        }

        let create = self
            .client
            .post(format!("{}/indexes", self.base_url))
            .json(&CreateIndexRequest {
                name: &spec.name,
                dimension: spec.dimension,
                metric: spec.metric,
            })
            .send()
            .await
            .map_err(|err| Self::unavailable(err.to_string()))?;

        match create.status() {
            status if status.is_success() => Ok((handle, EnsureOutcome::Created)),
            // Another caller won the creation race; that is still success.
            reqwest::StatusCode::CONFLICT => Ok((handle, EnsureOutcome::Existed)),
            status => Err(Self::unavailable(format!("create status {status}"))),
        }
    }

    async fn upsert(
        &self,
        handle: &VectorIndexHandle,
        entry: VectorEntry,
    ) -> Result<(), RagError> {
        let response = self
            .client
            .post(format!("{}/vectors", self.index_url(&handle.name)))
            .json(&entry)
            .send()
            .await
            .map_err(|err| Self::unavailable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(RagError::Consistency(format!(
                "index {} not visible yet",
                handle.name
            ))),
            status => Err(Self::unavailable(format!("upsert status {status}"))),
        }
    }

    async fn query(
        &self,
        handle: &VectorIndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        let response = self
            .client
            .post(format!("{}/query", self.index_url(&handle.name)))
            .json(&QueryRequest { vector, top_k })
            .send()
            .await
            .map_err(|err| Self::unavailable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let parsed: QueryResponse = response
                    .json()
                    .await
                    .map_err(|err| Self::unavailable(format!("malformed response: {err}")))?;
                Ok(parsed.matches)
            }
            reqwest::StatusCode::NOT_FOUND => Err(RagError::Consistency(format!(
                "index {} not visible yet",
                handle.name
            ))),
            status => Err(Self::unavailable(format!("query status {status}"))),
        }
    }
}
