//! Durable conversation and document persistence.
//!
//! The store exclusively owns writes to the relational schema. The
//! orchestrator only requests insertions; it never mutates rows. Users are
//! provisioned out-of-band ([`ConversationStore::create_user`]) — the chat
//! pipeline references them and fails with [`RagError::UnknownUser`] when
//! the reference is dangling.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RagError;

pub use sqlite::SqliteStore;

/// Namespace for content-derived document ids: identical text always maps to
/// the same id, so re-ingesting a document upserts instead of duplicating.
pub const DOCUMENT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1e, 0x0a, 0x52, 0x8f, 0x4d, 0x47, 0x3c, 0x9a, 0x21, 0xd4, 0x5b, 0x7e, 0x90, 0x13,
    0xaf,
]);

/// Derive the stable id for a document's text.
pub fn document_id(document: &str) -> Uuid {
    Uuid::new_v5(&DOCUMENT_ID_NAMESPACE, document.as_bytes())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One append-only conversation turn. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// An ingested document with its embedding. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub document: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Build a record whose id is derived from the document text.
    pub fn from_text(document: impl Into<String>, embedding: Vec<f32>) -> Self {
        let document = document.into();
        Self {
            id: document_id(&document),
            document,
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// Durable record of users, conversation turns, and ingested documents.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Provision a user. Not called by the pipeline.
    async fn create_user(&self, username: &str, email: &str) -> Result<User, RagError>;

    /// Look up a user by id.
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, RagError>;

    /// Append one conversation turn in a single atomic transaction.
    ///
    /// Verifies the user exists inside the transaction; a missing user fails
    /// with [`RagError::UnknownUser`] and writes nothing. Deliberately not
    /// idempotent — each call creates a new turn, so the orchestrator must
    /// call it at most once per logical request.
    async fn save_turn(
        &self,
        user_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<ConversationTurn, RagError>;

    /// All turns for a user, oldest first.
    async fn turns_for_user(&self, user_id: &str) -> Result<Vec<ConversationTurn>, RagError>;

    /// Insert or overwrite a document record by its content-derived id.
    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), RagError>;

    /// Total number of stored document records.
    async fn document_count(&self) -> Result<u64, RagError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_are_content_derived() {
        let a = document_id("cats are mammals");
        let b = document_id("cats are mammals");
        let c = document_id("the sky is blue");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn record_from_text_uses_derived_id() {
        let record = DocumentRecord::from_text("cats are mammals", vec![0.1, 0.2]);
        assert_eq!(record.id, document_id("cats are mammals"));
    }
}
