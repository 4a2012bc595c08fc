//! Semantic search over the vector index.
//!
//! [`SearchService`] embeds the query text once, delegates nearest-neighbor
//! retrieval to the [`VectorIndex`], and maps hits into [`SearchResult`]s.
//! Filters are conjunctive and applied by the index, so `k` counts matching
//! entries only. An empty or blank query short-circuits to no results
//! without touching the embedding provider.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{KbError, Result};
use crate::index::{QueryFilter, VectorIndex};
use crate::models::SearchResult;

/// Query-side entry point, sharing the provider and index with the indexer.
pub struct SearchService {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl SearchService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { provider, index }
    }

    /// Return up to `n_results` hits for `query`, best first.
    ///
    /// `n_results == 0` is an invalid argument; searching an empty index
    /// is not, it simply yields nothing.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<SearchResult>> {
        if n_results == 0 {
            return Err(KbError::InvalidArgument(
                "n_results must be > 0".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = embed_query(self.provider.as_ref(), query).await?;
        let hits = self.index.query(&vector, n_results, filter).await?;

        debug!(query, hits = hits.len(), "search complete");

        Ok(hits
            .into_iter()
            .map(|h| SearchResult {
                content: h.content,
                knowledge_id: h.knowledge_id,
                title: h.title,
                uri: h.uri,
                score: h.score,
                chunk_index: h.chunk_index,
            })
            .collect())
    }
}
