//! # Ragline: retrieval-augmented chat service
//!
//! Ragline answers a user question by retrieving semantically similar
//! documents from a vector index, conditioning a language model on them, and
//! durably recording the conversation turn.
//!
//! ```text
//! request ──► pipeline::RagOrchestrator
//!               │ validate input
//!               │ index::VectorIndex::ensure_index   (idempotent provisioning)
//!               │ providers::EmbeddingProvider::embed
//!               │ index::VectorIndex::query           (top-k context)
//!               │ providers::LanguageModel::generate  (augmented prompt)
//!               │ store::ConversationStore::save_turn (atomic append)
//!               ▼
//!             answer
//! ```
//!
//! A second, simpler pipeline ingests documents: embed, upsert into the index
//! under a content-derived id, and record in the relational store.
//!
//! ## Module Guide
//!
//! - [`providers`] — embedding and language-model seams plus HTTP adapters
//! - [`index`] — vector index contract, in-memory and remote implementations
//! - [`store`] — users, conversation turns, document records (sqlx/SQLite)
//! - [`pipeline`] — the orchestrator, prompt assembly, and retry policy
//! - [`server`] — axum transport implementing the JSON API
//! - [`config`] — environment-backed settings
//! - [`errors`] — the error taxonomy and stage tagging

pub mod config;
pub mod errors;
pub mod index;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod store;
