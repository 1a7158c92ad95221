//! Provider seams for embedding and language-model services.
//!
//! The orchestrator is provider-agnostic: it only sees the [`EmbeddingProvider`]
//! and [`LanguageModel`] traits. Concrete adapters live in submodules:
//!
//! * [`embedding`] — HTTP embedding adapter plus a deterministic mock for tests.
//! * [`llm`] — HTTP language-model adapter.
//!
//! Neither trait retries internally; retry policy is owned by the orchestrator.

pub mod embedding;
pub mod llm;

use async_trait::async_trait;

use crate::errors::RagError;

pub use embedding::{HttpEmbeddingProvider, MockEmbeddingProvider};
pub use llm::HttpLanguageModel;

/// Converts text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    ///
    /// Fails with [`RagError::InvalidInput`] when `text` is empty after
    /// trimming and [`RagError::ProviderUnavailable`] on transport failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Dimensionality of vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Produces a natural-language answer for an assembled prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate an answer for `prompt`.
    ///
    /// Fails with [`RagError::RateLimited`] when the provider signals
    /// throttling so the orchestrator can back off instead of failing fast.
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}
