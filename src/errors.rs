//! Error taxonomy for the retrieval pipeline.
//!
//! Every failure a pipeline stage can produce maps to one [`RagError`]
//! variant. The variants split along the retry boundary: client faults
//! (`InvalidInput`, `UnknownUser`) are never retried, transient
//! infrastructure faults (`ProviderUnavailable`, `RateLimited`,
//! `Consistency`) are retried with bounded backoff, and `Timeout` is
//! surfaced to the caller untouched.
//!
//! Stage failures are wrapped as [`PipelineError`] so callers can tell
//! "failed before producing an answer" apart from "answer produced, audit
//! write failed".

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for providers, the vector index, and the store.
#[derive(Clone, Debug, Error, Diagnostic)]
pub enum RagError {
    /// Client supplied malformed or empty input. Never retried.
    #[error("invalid input: {0}")]
    #[diagnostic(
        code(ragline::invalid_input),
        help("Both the user id and the message must be non-empty.")
    )]
    InvalidInput(String),

    /// The referenced user does not exist. Never retried.
    #[error("unknown user: {0}")]
    #[diagnostic(
        code(ragline::unknown_user),
        help("Conversation turns may only reference provisioned users.")
    )]
    UnknownUser(String),

    /// An external provider could not be reached or rejected the call.
    #[error("{provider} unavailable: {message}")]
    #[diagnostic(
        code(ragline::provider_unavailable),
        help("Check provider endpoint configuration and credentials.")
    )]
    ProviderUnavailable { provider: &'static str, message: String },

    /// The provider signalled throttling; retried with backoff.
    #[error("provider rate limited")]
    #[diagnostic(
        code(ragline::rate_limited),
        help("The orchestrator retries rate limits with exponential backoff.")
    )]
    RateLimited {
        /// Provider-supplied retry hint, honored over the computed backoff.
        retry_after: Option<Duration>,
    },

    /// The index vanished inside the provider's eventual-consistency window.
    #[error("index consistency fault: {0}")]
    #[diagnostic(
        code(ragline::consistency),
        help("Retried briefly; persistent occurrences indicate a provider fault.")
    )]
    Consistency(String),

    /// The request exceeded its overall deadline.
    #[error("request deadline exceeded")]
    #[diagnostic(code(ragline::timeout))]
    Timeout,

    /// Relational store failure.
    #[error("storage error: {0}")]
    #[diagnostic(
        code(ragline::storage),
        help("Ensure the database URL is valid and migrations have run.")
    )]
    Storage(String),
}

impl RagError {
    /// Whether the orchestrator may retry this error at a retryable stage.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::ProviderUnavailable { .. }
                | RagError::RateLimited { .. }
                | RagError::Consistency(_)
        )
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

/// The pipeline stage a request was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    IndexReady,
    Embedding,
    Retrieving,
    Generating,
    Persisting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::IndexReady => "index_ready",
            Stage::Embedding => "embedding",
            Stage::Retrieving => "retrieving",
            Stage::Generating => "generating",
            Stage::Persisting => "persisting",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage-tagged pipeline failure.
#[derive(Debug, Error, Diagnostic)]
#[error("pipeline failed at {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: RagError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: RagError) -> Self {
        Self { stage, source }
    }
}
