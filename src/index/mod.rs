//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the persistent store of
//! `(vector, chunk text, metadata)` entries the indexing coordinator writes
//! and the search service queries, enabling pluggable backends
//! ([`sqlite::SqliteIndex`] for durable collections, [`memory::MemoryIndex`]
//! for tests).
//!
//! # Contract
//!
//! - `upsert` replaces the full chunk set of one knowledge item atomically:
//!   a concurrent reader sees either the old complete set or the new one,
//!   never a mix and never stale leftovers.
//! - `query` returns up to `k` nearest entries by cosine similarity with
//!   scores mapped to `[0, 1]`, restricted by conjunctive metadata filters;
//!   ties are broken by insertion order (stable, not meaningful).
//! - `delete` is a no-op success when nothing matches.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::TextChunk;

/// Conjunctive metadata predicate for [`VectorIndex::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Exact match on the chunk's category.
    pub category: Option<String>,
    /// Substring match on the chunk's comma-separated tags.
    pub tags: Option<String>,
    /// Set membership on the owning knowledge item.
    pub knowledge_ids: Option<Vec<i64>>,
}

impl QueryFilter {
    /// Evaluate the predicate against one entry's metadata.
    pub fn matches(
        &self,
        knowledge_id: i64,
        category: Option<&str>,
        tags: Option<&str>,
    ) -> bool {
        if let Some(ref want) = self.category {
            if category != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(ref want) = self.tags {
            match tags {
                Some(t) if t.contains(want.as_str()) => {}
                _ => return false,
            }
        }
        if let Some(ref ids) = self.knowledge_ids {
            if !ids.contains(&knowledge_id) {
                return false;
            }
        }
        true
    }
}

/// One entry returned from a nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub knowledge_id: i64,
    pub title: String,
    pub uri: String,
    pub content: String,
    pub chunk_index: i64,
    /// Similarity in `[0, 1]`, higher = closer.
    pub score: f64,
}

/// Collection-level counters.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub total_chunks: i64,
    pub unique_knowledge_items: i64,
}

/// Persistent store of embedded chunks, keyed by generated chunk ids.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace all chunks of `knowledge_id` with the given set.
    ///
    /// Delete-then-insert within one logical operation: callers never
    /// observe a state mixing old and new chunks. `chunks` and
    /// `embeddings` must have equal length.
    async fn upsert(
        &self,
        knowledge_id: i64,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()>;

    /// Remove all chunks of `knowledge_id`, returning how many were removed.
    async fn delete(&self, knowledge_id: i64) -> Result<u64>;

    /// Return up to `k` nearest entries to `vector` matching `filter`,
    /// ordered by descending score.
    async fn query(&self, vector: &[f32], k: usize, filter: &QueryFilter)
        -> Result<Vec<ScoredChunk>>;

    /// Total chunk count and count of distinct knowledge items.
    async fn stats(&self) -> Result<IndexStats>;
}

/// Deterministic chunk id, derivable back to the owning knowledge item.
/// `position` is the chunk's ordinal in the item's combined chunk list.
pub(crate) fn chunk_id(knowledge_id: i64, position: usize) -> String {
    format!("{}:{}", knowledge_id, position)
}

/// Map raw cosine similarity (`[-1, 1]`) into the `[0, 1]` score contract.
pub(crate) fn normalize_score(cosine: f32) -> f64 {
    ((f64::from(cosine) + 1.0) / 2.0).clamp(0.0, 1.0)
}
