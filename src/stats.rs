//! Collection statistics reporting.

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

/// Snapshot of what the collection currently holds.
#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub total_chunks: i64,
    pub unique_knowledge_items: i64,
    pub collection_name: String,
    pub embedding_model_name: String,
}

/// Gather counters from the index and identity from the provider.
pub async fn gather(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    collection_name: &str,
) -> Result<CollectionStats> {
    let counts = index.stats().await?;
    Ok(CollectionStats {
        total_chunks: counts.total_chunks,
        unique_knowledge_items: counts.unique_knowledge_items,
        collection_name: collection_name.to_string(),
        embedding_model_name: provider.model_name().to_string(),
    })
}

/// Render the snapshot as an aligned text block for CLI output.
pub fn render(stats: &CollectionStats) -> String {
    format!(
        "Collection:       {}\n\
         Embedding model:  {}\n\
         Knowledge items:  {}\n\
         Total chunks:     {}",
        stats.collection_name,
        stats.embedding_model_name,
        stats.unique_knowledge_items,
        stats.total_chunks
    )
}
