//! SQLite-backed [`VectorIndex`] implementation.
//!
//! One collection maps to one database file,
//! `<persist_directory>/<collection_name>.sqlite3`, so reopening the same
//! configuration reopens the same data. Vectors are stored as little-endian
//! f32 BLOBs; similarity is computed in-process over all candidate rows.
//! Upsert runs delete-then-insert inside a single transaction, which gives
//! readers the old complete chunk set or the new one, never a mix.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{KbError, Result};
use crate::models::TextChunk;

use super::{chunk_id, normalize_score, IndexStats, QueryFilter, ScoredChunk, VectorIndex};

/// Durable vector collection stored in SQLite.
pub struct SqliteIndex {
    pool: SqlitePool,
    collection_name: String,
}

impl SqliteIndex {
    /// Open (creating if missing) the collection database and ensure its
    /// schema exists. Idempotent.
    pub async fn open(persist_directory: &Path, collection_name: &str) -> Result<Self> {
        std::fs::create_dir_all(persist_directory)?;
        let db_path = persist_directory.join(format!("{}.sqlite3", collection_name));

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(KbError::Storage)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                knowledge_id INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                start_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                title TEXT NOT NULL,
                uri TEXT NOT NULL,
                document_type TEXT NOT NULL,
                category TEXT,
                tags TEXT,
                indexed_at INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_knowledge_id ON chunks(knowledge_id)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            collection_name: collection_name.to_string(),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(
        &self,
        knowledge_id: i64,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(KbError::InvalidArgument(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE knowledge_id = ?")
            .bind(knowledge_id)
            .execute(&mut *tx)
            .await?;

        for (position, (chunk, vector)) in chunks.iter().zip(embeddings.iter()).enumerate() {
            let blob = vec_to_blob(vector);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, knowledge_id, chunk_index, start_index, content,
                                    title, uri, document_type, category, tags,
                                    indexed_at, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk_id(knowledge_id, position))
            .bind(knowledge_id)
            .bind(chunk.metadata.chunk_index)
            .bind(chunk.metadata.start_index)
            .bind(&chunk.content)
            .bind(&chunk.metadata.title)
            .bind(&chunk.metadata.uri)
            .bind(chunk.metadata.document_type.to_string())
            .bind(&chunk.metadata.category)
            .bind(&chunk.metadata.tags)
            .bind(chunk.metadata.indexed_at)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, knowledge_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE knowledge_id = ?")
            .bind(knowledge_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT rowid, knowledge_id, chunk_index, content, title, uri,
                   category, tags, embedding
            FROM chunks
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(i64, ScoredChunk)> = Vec::new();

        for row in &rows {
            let knowledge_id: i64 = row.get("knowledge_id");
            let category: Option<String> = row.get("category");
            let tags: Option<String> = row.get("tags");

            if !filter.matches(knowledge_id, category.as_deref(), tags.as_deref()) {
                continue;
            }

            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            let score = normalize_score(cosine_similarity(vector, &stored));
            scored.push((
                row.get("rowid"),
                ScoredChunk {
                    knowledge_id,
                    title: row.get("title"),
                    uri: row.get("uri"),
                    content: row.get("content"),
                    chunk_index: row.get("chunk_index"),
                    score,
                },
            ));
        }

        // Descending score; insertion order (rowid) breaks ties stably.
        scored.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let unique_knowledge_items: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT knowledge_id) FROM chunks")
                .fetch_one(&self.pool)
                .await?;
        Ok(IndexStats {
            total_chunks,
            unique_knowledge_items,
        })
    }
}
