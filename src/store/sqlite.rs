//! SQLite-backed [`ConversationStore`] using `sqlx`.
//!
//! Embedded migrations (`sqlx::migrate!`) run on connect, so a fresh database
//! file is usable immediately. Embedding vectors are stored as JSON text in
//! the `document_records.embedding` column.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

use super::{ConversationStore, ConversationTurn, DocumentRecord, User};
use crate::errors::RagError;

/// SQLite store with a shared connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

impl SqliteStore {
    /// Connect (or create) a SQLite database at `database_url` and run
    /// embedded migrations. Example URL: `sqlite://ragline.db`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|err| RagError::Storage(format!("invalid database url: {err}")))?
            .create_if_missing(true);

        // An in-memory database exists per connection; cap the pool at one
        // connection so every query sees the same schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|err| RagError::Storage(format!("connect error: {err}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| RagError::Storage(format!("migration failure: {err}")))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn, RagError> {
        let id: String = row.try_get("id")?;
        Ok(ConversationTurn {
            id: Uuid::parse_str(&id)
                .map_err(|err| RagError::Storage(format!("malformed turn id: {err}")))?,
            user_id: row.try_get("user_id")?,
            question: row.try_get("message")?,
            answer: row.try_get("response")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    #[instrument(skip(self), err)]
    async fn create_user(&self, username: &str, email: &str) -> Result<User, RagError> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, RagError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|row| {
            Ok(User {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                email: row.try_get("email")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, question, answer), fields(user_id = %user_id), err)]
    async fn save_turn(
        &self,
        user_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<ConversationTurn, RagError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| RagError::Storage(format!("tx begin: {err}")))?;

        let user_exists = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !user_exists {
            return Err(RagError::UnknownUser(user_id.to_string()));
        }

        let turn = ConversationTurn {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO conversation_turns (id, user_id, message, response, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(turn.id.to_string())
        .bind(&turn.user_id)
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(turn.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|err| RagError::Storage(format!("tx commit: {err}")))?;

        Ok(turn)
    }

    async fn turns_for_user(&self, user_id: &str) -> Result<Vec<ConversationTurn>, RagError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, message, response, created_at
            FROM conversation_turns
            WHERE user_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(Self::turn_from_row).collect()
    }

    #[instrument(skip(self, record), fields(document_id = %record.id), err)]
    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), RagError> {
        let embedding_json = serde_json::to_string(&record.embedding)
            .map_err(|err| RagError::Storage(format!("embedding encode: {err}")))?;

        // Identical text derives an identical id, so re-ingestion overwrites
        // the embedding while keeping the original created_at.
        sqlx::query(
            r#"
            INSERT INTO document_records (id, document, embedding, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET embedding = excluded.embedding
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.document)
        .bind(embedding_json)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    async fn document_count(&self) -> Result<u64, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_records")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count as u64)
    }
}
