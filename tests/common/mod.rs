//! Shared fakes and fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ragline::errors::RagError;
use ragline::index::{
    EnsureOutcome, IndexSpec, Metric, QueryHit, VectorEntry, VectorIndex, VectorIndexHandle,
};
use ragline::providers::{EmbeddingProvider, LanguageModel, MockEmbeddingProvider};
use ragline::store::{ConversationStore, ConversationTurn, DocumentRecord, User};

pub const DIMENSION: usize = 64;

pub fn index_spec() -> IndexSpec {
    IndexSpec {
        name: "ragline-test".to_string(),
        dimension: DIMENSION,
        metric: Metric::Cosine,
    }
}

/// Deterministic embedder that counts calls.
pub struct CountingEmbedder {
    inner: MockEmbeddingProvider,
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: MockEmbeddingProvider::new(DIMENSION),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Vector index wrapper that counts every operation.
pub struct CountingIndex<I> {
    inner: I,
    pub ensure_calls: AtomicUsize,
    pub upsert_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

impl<I> CountingIndex<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            ensure_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
            + self.upsert_calls.load(Ordering::SeqCst)
            + self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<I: VectorIndex> VectorIndex for CountingIndex<I> {
    async fn ensure_index(
        &self,
        spec: &IndexSpec,
    ) -> Result<(VectorIndexHandle, EnsureOutcome), RagError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_index(spec).await
    }

    async fn upsert(
        &self,
        handle: &VectorIndexHandle,
        entry: VectorEntry,
    ) -> Result<(), RagError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(handle, entry).await
    }

    async fn query(
        &self,
        handle: &VectorIndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query(handle, vector, top_k).await
    }
}

/// Language model driven by a script of responses; replays the final answer
/// once the script is exhausted. Records every prompt it sees.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, RagError>>>,
    pub prompts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn answering(answer: &str) -> Self {
        Self::with_script(vec![Ok(answer.to_string())])
    }

    pub fn with_script(script: Vec<Result<String, RagError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().expect("script checked non-empty")
        } else {
            // Replay the final scripted response forever.
            match script.front() {
                Some(response) => response.clone(),
                None => Err(RagError::ProviderUnavailable {
                    provider: "language model",
                    message: "empty script".to_string(),
                }),
            }
        }
    }
}

/// Language model that never finishes within a test deadline.
pub struct StalledLlm;

#[async_trait]
impl LanguageModel for StalledLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, RagError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

/// Store whose `save_turn` always fails with a storage fault; everything
/// else delegates to the wrapped store.
pub struct BrokenSaveStore<S> {
    inner: S,
}

impl<S> BrokenSaveStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: ConversationStore> ConversationStore for BrokenSaveStore<S> {
    async fn create_user(&self, username: &str, email: &str) -> Result<User, RagError> {
        self.inner.create_user(username, email).await
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, RagError> {
        self.inner.find_user(user_id).await
    }

    async fn save_turn(
        &self,
        _user_id: &str,
        _question: &str,
        _answer: &str,
    ) -> Result<ConversationTurn, RagError> {
        Err(RagError::Storage("disk full".to_string()))
    }

    async fn turns_for_user(&self, user_id: &str) -> Result<Vec<ConversationTurn>, RagError> {
        self.inner.turns_for_user(user_id).await
    }

    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), RagError> {
        self.inner.upsert_document(record).await
    }

    async fn document_count(&self) -> Result<u64, RagError> {
        self.inner.document_count().await
    }
}

/// Refiner that fails on every call.
pub struct UnavailableRefiner;

#[async_trait]
impl LanguageModel for UnavailableRefiner {
    async fn generate(&self, _prompt: &str) -> Result<String, RagError> {
        Err(RagError::ProviderUnavailable {
            provider: "refiner",
            message: "offline".to_string(),
        })
    }
}

pub async fn in_memory_store() -> ragline::store::SqliteStore {
    ragline::store::SqliteStore::connect("sqlite::memory:")
        .await
        .expect("in-memory store")
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
