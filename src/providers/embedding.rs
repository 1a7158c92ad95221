//! Embedding provider adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::EmbeddingProvider;
use crate::errors::RagError;

/// HTTP adapter for a remote embedding service.
///
/// Speaks a minimal JSON contract: `POST {endpoint}` with `{"input": text}`
/// and expects `{"embedding": [f32, ...]}` back. Any transport or decode
/// failure surfaces as [`RagError::ProviderUnavailable`]; the response
/// payload is logged, never forwarded to callers.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            dimension,
        }
    }

    fn unavailable(message: impl Into<String>) -> RagError {
        RagError::ProviderUnavailable {
            provider: "embedding",
            message: message.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    #[instrument(skip(self, text), fields(endpoint = %self.endpoint), err)]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RagError::InvalidInput(
                "embedding input is empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { input: trimmed })
            .send()
            .await
            .map_err(|err| Self::unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body, "embedding provider returned error payload");
            return Err(Self::unavailable(format!("status {status}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|err| Self::unavailable(format!("malformed response: {err}")))?;

        if parsed.embedding.len() != self.dimension {
            return Err(Self::unavailable(format!(
                "expected dimension {}, got {}",
                self.dimension,
                parsed.embedding.len()
            )));
        }

        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic in-process embedder for tests and offline development.
///
/// Hashes character n-grams into a fixed-size vector and L2-normalizes it, so
/// identical text always embeds identically and overlapping text lands
/// nearby. Not a semantic model; good enough for retrieval plumbing tests.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();
        for window in chars.windows(3) {
            let mut hash: u64 = 0xcbf29ce484222325;
            for ch in window {
                hash ^= *ch as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            let slot = (hash % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "embedding input is empty".to_string(),
            ));
        }
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_is_deterministic() {
        let provider = MockEmbeddingProvider::new(64);
        let a = provider.embed("cats are mammals").await.unwrap();
        let b = provider.embed("cats are mammals").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn mock_separates_unrelated_text() {
        let provider = MockEmbeddingProvider::new(64);
        let a = provider.embed("cats are mammals").await.unwrap();
        let b = provider.embed("the sky is blue").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn mock_rejects_blank_input() {
        let provider = MockEmbeddingProvider::new(64);
        let err = provider.embed("   ").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }
}
