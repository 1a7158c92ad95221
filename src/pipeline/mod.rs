//! Request-scoped RAG orchestration.
//!
//! The chat pipeline is a fixed state machine:
//!
//! ```text
//! Validating → IndexReady → Embedding → Retrieving → Generating → Persisting → Completed
//!      │            │            │           │            │            │
//!      └────────────┴────────────┴───────────┴────────────┴────────────┴──► Failed(stage, reason)
//! ```
//!
//! Retries apply only where the contract marks a stage retryable: provider
//! faults while provisioning the index, consistency faults while querying it,
//! and rate limits while generating. Every other error fails fast. The whole
//! request runs under one deadline; stages not yet reached when it expires
//! perform no work, so a timeout never leaves a partial turn behind.
//!
//! One deliberate asymmetry in `Persisting`: an unknown user is a client
//! fault and fails the request, but an infrastructure fault after the answer
//! was already generated degrades instead of failing — the caller still gets
//! the answer and the lost audit write is reported through tracing.

pub mod prompt;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{PipelineError, RagError, Stage};
use crate::index::{EnsureOutcome, IndexSpec, VectorEntry, VectorIndex, VectorIndexHandle};
use crate::providers::{EmbeddingProvider, LanguageModel};
use crate::store::{ConversationStore, ConversationTurn, DocumentRecord};

pub use prompt::{ContextSnippet, build_prompt, build_refine_prompt};
pub use retry::{RetryPolicy, retry_with_backoff};

/// Inbound chat request.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
}

/// Result of a completed chat request.
#[derive(Clone, Debug)]
pub struct ChatOutcome {
    pub answer: String,
    /// The persisted turn; `None` when persistence degraded.
    pub turn: Option<ConversationTurn>,
    /// Set when the answer was produced but the audit write failed.
    pub degraded: Option<String>,
    /// Number of context snippets fed to the language model.
    pub retrieved: usize,
}

/// Result of a completed document ingestion.
#[derive(Clone, Debug)]
pub struct IngestReceipt {
    pub document_id: Uuid,
    pub provisioning: EnsureOutcome,
}

/// Coordinates providers, the vector index, and the store into one
/// request-scoped pipeline.
pub struct RagOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LanguageModel>,
    /// Optional second-pass rewriter. When absent or failing, the raw answer
    /// passes through unchanged.
    refiner: Option<Arc<dyn LanguageModel>>,
    store: Arc<dyn ConversationStore>,
    index_spec: IndexSpec,
    top_k: usize,
    retry: RetryPolicy,
    deadline: Duration,
}

impl RagOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn ConversationStore>,
        index_spec: IndexSpec,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            refiner: None,
            store,
            index_spec,
            top_k: 4,
            retry: RetryPolicy::default(),
            deadline: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_refiner(mut self, refiner: Arc<dyn LanguageModel>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Run the full chat pipeline for one request.
    #[instrument(skip(self, request), fields(user_id = %request.user_id), err)]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, PipelineError> {
        let user_id = request.user_id.trim().to_string();
        let message = request.message.trim().to_string();
        if user_id.is_empty() || message.is_empty() {
            // No side effects before validation passes.
            return Err(PipelineError::new(
                Stage::Validating,
                RagError::InvalidInput("user id and message must be non-empty".to_string()),
            ));
        }

        let stage = Arc::new(Mutex::new(Stage::IndexReady));
        let pipeline = self.run_chat(&user_id, &message, stage.clone());
        match tokio::time::timeout(self.deadline, pipeline).await {
            Ok(result) => result,
            Err(_) => {
                let timed_out_at = *stage.lock();
                tracing::warn!(stage = %timed_out_at, "request deadline exceeded");
                Err(PipelineError::new(timed_out_at, RagError::Timeout))
            }
        }
    }

    async fn run_chat(
        &self,
        user_id: &str,
        message: &str,
        stage: Arc<Mutex<Stage>>,
    ) -> Result<ChatOutcome, PipelineError> {
        let handle = self.ensure_index(&stage).await?;

        *stage.lock() = Stage::Embedding;
        let query_vector = self
            .embedder
            .embed(message)
            .await
            .map_err(|err| PipelineError::new(Stage::Embedding, err))?;

        *stage.lock() = Stage::Retrieving;
        let context = self.retrieve(&handle, &query_vector).await?;

        *stage.lock() = Stage::Generating;
        let answer = self.generate(message, &context).await?;

        *stage.lock() = Stage::Persisting;
        match self.store.save_turn(user_id, message, &answer).await {
            Ok(turn) => Ok(ChatOutcome {
                answer,
                turn: Some(turn),
                degraded: None,
                retrieved: context.len(),
            }),
            Err(err @ RagError::UnknownUser(_)) => {
                Err(PipelineError::new(Stage::Persisting, err))
            }
            Err(err) => {
                // The user-visible contract (an answer) outranks the audit
                // log, but the lost write must stay observable.
                tracing::warn!(
                    error = %err,
                    user_id,
                    "persistence degraded: answer returned without a conversation record"
                );
                Ok(ChatOutcome {
                    answer,
                    turn: None,
                    degraded: Some(err.to_string()),
                    retrieved: context.len(),
                })
            }
        }
    }

    /// Run the document ingestion pipeline: embed the document, upsert it
    /// into the vector index under its content-derived id, and record it in
    /// the relational store.
    #[instrument(skip(self, document), err)]
    pub async fn ingest(&self, document: &str) -> Result<IngestReceipt, PipelineError> {
        let document = document.trim().to_string();
        if document.is_empty() {
            return Err(PipelineError::new(
                Stage::Validating,
                RagError::InvalidInput("document must be non-empty".to_string()),
            ));
        }

        let stage = Arc::new(Mutex::new(Stage::IndexReady));
        let pipeline = self.run_ingest(&document, stage.clone());
        match tokio::time::timeout(self.deadline, pipeline).await {
            Ok(result) => result,
            Err(_) => {
                let timed_out_at = *stage.lock();
                tracing::warn!(stage = %timed_out_at, "ingestion deadline exceeded");
                Err(PipelineError::new(timed_out_at, RagError::Timeout))
            }
        }
    }

    async fn run_ingest(
        &self,
        document: &str,
        stage: Arc<Mutex<Stage>>,
    ) -> Result<IngestReceipt, PipelineError> {
        let (handle, provisioning) = {
            *stage.lock() = Stage::IndexReady;
            let spec = &self.index_spec;
            retry_with_backoff(
                &self.retry,
                |err| matches!(err, RagError::ProviderUnavailable { .. }),
                || self.index.ensure_index(spec),
            )
            .await
            .map_err(|err| PipelineError::new(Stage::IndexReady, err))?
        };

        *stage.lock() = Stage::Embedding;
        let embedding = self
            .embedder
            .embed(document)
            .await
            .map_err(|err| PipelineError::new(Stage::Embedding, err))?;

        let record = DocumentRecord::from_text(document, embedding.clone());

        *stage.lock() = Stage::Persisting;
        let entry = VectorEntry {
            id: record.id.to_string(),
            vector: embedding,
            metadata: json!({ "document": record.document }),
        };
        retry_with_backoff(
            &self.retry,
            |err| matches!(err, RagError::Consistency(_)),
            || self.index.upsert(&handle, entry.clone()),
        )
        .await
        .map_err(|err| PipelineError::new(Stage::Persisting, err))?;

        self.store
            .upsert_document(&record)
            .await
            .map_err(|err| PipelineError::new(Stage::Persisting, err))?;

        Ok(IngestReceipt {
            document_id: record.id,
            provisioning,
        })
    }

    async fn ensure_index(
        &self,
        stage: &Arc<Mutex<Stage>>,
    ) -> Result<VectorIndexHandle, PipelineError> {
        *stage.lock() = Stage::IndexReady;
        let spec = &self.index_spec;
        let (handle, _) = retry_with_backoff(
            &self.retry,
            |err| matches!(err, RagError::ProviderUnavailable { .. }),
            || self.index.ensure_index(spec),
        )
        .await
        .map_err(|err| PipelineError::new(Stage::IndexReady, err))?;
        Ok(handle)
    }

    async fn retrieve(
        &self,
        handle: &VectorIndexHandle,
        query_vector: &[f32],
    ) -> Result<Vec<ContextSnippet>, PipelineError> {
        let hits = retry_with_backoff(
            &self.retry,
            |err| matches!(err, RagError::Consistency(_)),
            || self.index.query(handle, query_vector, self.top_k),
        )
        .await
        .map_err(|err| PipelineError::new(Stage::Retrieving, err))?;

        // An empty result set is valid: the question simply gets no context.
        let context: Vec<ContextSnippet> = hits
            .into_iter()
            .filter_map(|hit| {
                let text = hit.metadata.get("document")?.as_str()?.to_string();
                Some(ContextSnippet {
                    id: hit.id,
                    text,
                    score: hit.score,
                })
            })
            .collect();
        Ok(context)
    }

    async fn generate(
        &self,
        message: &str,
        context: &[ContextSnippet],
    ) -> Result<String, PipelineError> {
        let prompt = build_prompt(message, context);
        let raw = retry_with_backoff(
            &self.retry,
            |err| matches!(err, RagError::RateLimited { .. }),
            || self.llm.generate(&prompt),
        )
        .await
        .map_err(|err| PipelineError::new(Stage::Generating, err))?;

        // Explicit fallback branch: when refinement is unavailable the raw
        // answer passes through unchanged.
        let answer = match &self.refiner {
            Some(refiner) => {
                match refiner.generate(&build_refine_prompt(message, &raw)).await {
                    Ok(refined) if !refined.trim().is_empty() => refined,
                    Ok(_) => raw,
                    Err(err) => {
                        tracing::debug!(error = %err, "refiner unavailable, passing raw answer through");
                        raw
                    }
                }
            }
            None => raw,
        };
        Ok(answer)
    }
}
