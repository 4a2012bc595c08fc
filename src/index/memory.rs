//! In-memory [`VectorIndex`] implementation for tests and embedding-free
//! experiments.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`; vector search is
//! brute-force cosine similarity. A monotonically increasing counter records
//! insertion order for stable tie-breaking. Nothing survives the process.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{KbError, Result};
use crate::models::TextChunk;

use super::{chunk_id, normalize_score, IndexStats, QueryFilter, ScoredChunk, VectorIndex};

struct StoredEntry {
    _id: String,
    knowledge_id: i64,
    chunk_index: i64,
    content: String,
    title: String,
    uri: String,
    category: Option<String>,
    tags: Option<String>,
    vector: Vec<f32>,
    order: u64,
}

/// Volatile vector collection.
pub struct MemoryIndex {
    entries: RwLock<Vec<StoredEntry>>,
    counter: RwLock<u64>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            counter: RwLock::new(0),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
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

        // Single write lock covers delete + insert, so readers see either
        // the old complete set or the new one.
        let mut entries = self.entries.write().unwrap();
        let mut counter = self.counter.write().unwrap();
        entries.retain(|e| e.knowledge_id != knowledge_id);
        for (position, (chunk, vector)) in chunks.iter().zip(embeddings.iter()).enumerate() {
            *counter += 1;
            entries.push(StoredEntry {
                _id: chunk_id(knowledge_id, position),
                knowledge_id,
                chunk_index: chunk.metadata.chunk_index,
                content: chunk.content.clone(),
                title: chunk.metadata.title.clone(),
                uri: chunk.metadata.uri.clone(),
                category: chunk.metadata.category.clone(),
                tags: chunk.metadata.tags.clone(),
                vector: vector.clone(),
                order: *counter,
            });
        }
        Ok(())
    }

    async fn delete(&self, knowledge_id: i64) -> Result<u64> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|e| e.knowledge_id != knowledge_id);
        Ok((before - entries.len()) as u64)
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().unwrap();

        let mut scored: Vec<(u64, ScoredChunk)> = entries
            .iter()
            .filter(|e| filter.matches(e.knowledge_id, e.category.as_deref(), e.tags.as_deref()))
            .map(|e| {
                let score = normalize_score(cosine_similarity(vector, &e.vector));
                (
                    e.order,
                    ScoredChunk {
                        knowledge_id: e.knowledge_id,
                        title: e.title.clone(),
                        uri: e.uri.clone(),
                        content: e.content.clone(),
                        chunk_index: e.chunk_index,
                        score,
                    },
                )
            })
            .collect();

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
        let entries = self.entries.read().unwrap();
        let total_chunks = entries.len() as i64;
        let mut ids: Vec<i64> = entries.iter().map(|e| e.knowledge_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(IndexStats {
            total_chunks,
            unique_knowledge_items: ids.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, DocumentType};

    fn make_chunk(knowledge_id: i64, idx: i64, content: &str) -> TextChunk {
        TextChunk {
            content: content.to_string(),
            start_index: 0,
            chunk_index: idx as usize,
            metadata: ChunkMetadata {
                knowledge_id,
                title: format!("item-{}", knowledge_id),
                uri: format!("./item-{}.md", knowledge_id),
                document_type: DocumentType::Markdown,
                category: None,
                tags: None,
                chunk_index: idx,
                start_index: 0,
                indexed_at: 0,
            },
        }
    }

    #[tokio::test]
    async fn upsert_replaces_previous_chunks() {
        let index = MemoryIndex::new();
        let chunks: Vec<TextChunk> = (0..3).map(|i| make_chunk(1, i, "old")).collect();
        let vectors = vec![vec![1.0, 0.0]; 3];
        index.upsert(1, &chunks, &vectors).await.unwrap();

        let chunks2: Vec<TextChunk> = (0..2).map(|i| make_chunk(1, i, "new")).collect();
        let vectors2 = vec![vec![0.0, 1.0]; 2];
        index.upsert(1, &chunks2, &vectors2).await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.unique_knowledge_items, 1);
    }

    #[tokio::test]
    async fn upsert_rejects_length_mismatch() {
        let index = MemoryIndex::new();
        let chunks = vec![make_chunk(1, 0, "a")];
        let err = index.upsert(1, &chunks, &[]).await.unwrap_err();
        assert!(matches!(err, KbError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_is_noop_when_absent() {
        let index = MemoryIndex::new();
        assert_eq!(index.delete(99).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_ranks_by_similarity() {
        let index = MemoryIndex::new();
        index
            .upsert(1, &[make_chunk(1, 0, "north")], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        index
            .upsert(2, &[make_chunk(2, 0, "east")], &[vec![0.0, 1.0]])
            .await
            .unwrap();

        let hits = index
            .query(&[1.0, 0.1], 10, &QueryFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].knowledge_id, 1);
        assert!(hits[0].score > hits[1].score);
        for h in &hits {
            assert!(h.score >= 0.0 && h.score <= 1.0);
        }
    }

    #[tokio::test]
    async fn ties_break_by_insertion_order() {
        let index = MemoryIndex::new();
        index
            .upsert(2, &[make_chunk(2, 0, "b")], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        index
            .upsert(1, &[make_chunk(1, 0, "a")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let hits = index
            .query(&[1.0, 0.0], 10, &QueryFilter::default())
            .await
            .unwrap();
        // Identical scores: the earlier insertion (knowledge 2) wins.
        assert_eq!(hits[0].knowledge_id, 2);
        assert_eq!(hits[1].knowledge_id, 1);
    }

    #[tokio::test]
    async fn k_truncates_results() {
        let index = MemoryIndex::new();
        for id in 1..=5 {
            index
                .upsert(id, &[make_chunk(id, 0, "x")], &[vec![1.0, 0.0]])
                .await
                .unwrap();
        }
        let hits = index
            .query(&[1.0, 0.0], 2, &QueryFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn filters_restrict_results() {
        let index = MemoryIndex::new();
        let mut tagged = make_chunk(1, 0, "tagged");
        tagged.metadata.category = Some("security".to_string());
        tagged.metadata.tags = Some("auth,oauth".to_string());
        index.upsert(1, &[tagged], &[vec![1.0, 0.0]]).await.unwrap();
        index
            .upsert(2, &[make_chunk(2, 0, "plain")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let by_category = index
            .query(
                &[1.0, 0.0],
                10,
                &QueryFilter {
                    category: Some("security".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].knowledge_id, 1);

        let no_match = index
            .query(
                &[1.0, 0.0],
                10,
                &QueryFilter {
                    category: Some("networking".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(no_match.is_empty());
    }
}
