//! Indexing coordinator: load, split, embed, upsert.
//!
//! [`Indexer::index_item`] drives one knowledge item through the full
//! pipeline and reports the outcome as a value. It never returns `Err`;
//! every failure mode lands in [`IndexingResult`] with `success = false`
//! and a human-readable message, so batch callers can keep going and
//! record per-item state without `catch`-style control flow.
//!
//! The returned `content_hash` is an aggregate fingerprint over every
//! document loaded from the source, combined in `document_id` order, so
//! it is stable across runs regardless of filesystem enumeration order.
//! Callers compare it with the previously stored hash to skip unchanged
//! items; the coordinator itself always reindexes when asked.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{KbError, Result};
use crate::index::VectorIndex;
use crate::loader::DocumentLoader;
use crate::models::{ChunkMetadata, IndexingResult, ItemStatus, KnowledgeItem, TextChunk};
use crate::splitter::TextSplitter;

/// Outcome of one item inside an [`Indexer::index_all`] run.
#[derive(Debug)]
pub struct ItemReport {
    pub knowledge_id: i64,
    pub title: String,
    pub result: IndexingResult,
}

/// Orchestrates loading, chunking, embedding, and index writes.
pub struct Indexer {
    loader: DocumentLoader,
    splitter: TextSplitter,
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        config: &Config,
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        Ok(Self {
            loader: DocumentLoader::new(&config.loader),
            splitter: TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?,
            provider,
            index,
            batch_size: config.embedding.batch_size.max(1),
        })
    }

    /// Index (or reindex) one knowledge item.
    ///
    /// Always returns a result value; inspect `success` and `error`. A
    /// source that loads but contains no text is a failure ("no content
    /// to index"), since a silent empty index entry would be
    /// indistinguishable from success.
    pub async fn index_item(&self, item: &KnowledgeItem) -> IndexingResult {
        let outcome = match self.loader.load(&item.uri, item.document_type).await {
            Ok(o) => o,
            Err(e) => return IndexingResult::failed(e.to_string()),
        };

        for failure in &outcome.failures {
            warn!(
                knowledge_id = item.id,
                source = %failure.source,
                error = %failure.error,
                "document skipped during load"
            );
        }

        let mut documents: Vec<_> = outcome
            .documents
            .into_iter()
            .filter(|d| !d.content.trim().is_empty())
            .collect();
        if documents.is_empty() {
            return IndexingResult::failed(KbError::EmptyContent.to_string());
        }
        documents.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        let aggregate_hash = aggregate_hash(documents.iter().map(|d| d.content_hash.as_str()));

        let indexed_at = chrono::Utc::now().timestamp();
        let mut chunks: Vec<TextChunk> = Vec::new();
        for doc in &documents {
            let base = ChunkMetadata {
                knowledge_id: item.id,
                title: doc.title.clone().unwrap_or_else(|| item.title.clone()),
                uri: doc.source_uri.clone(),
                document_type: item.document_type,
                category: item.category.clone(),
                tags: item.tags.clone(),
                chunk_index: 0,
                start_index: 0,
                indexed_at,
            };
            chunks.extend(self.splitter.split(&doc.content, &base));
        }

        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            match self.provider.embed(&texts).await {
                Ok(vectors) => embeddings.extend(vectors),
                Err(e) => return IndexingResult::failed(e.to_string()),
            }
        }

        if let Err(e) = self.index.upsert(item.id, &chunks, &embeddings).await {
            return IndexingResult::failed(e.to_string());
        }

        info!(
            knowledge_id = item.id,
            chunks = chunks.len(),
            documents = documents.len(),
            "indexed knowledge item"
        );

        IndexingResult::ok(chunks.len(), aggregate_hash)
    }

    /// Remove every chunk of a knowledge item from the index.
    ///
    /// Returns whether anything was actually removed; removing an item
    /// that was never indexed is a successful no-op.
    pub async fn remove(&self, knowledge_id: i64) -> Result<bool> {
        let removed = self.index.delete(knowledge_id).await?;
        info!(knowledge_id, chunks_removed = removed, "removed from index");
        Ok(removed > 0)
    }

    /// Index a batch of items, optionally restricted to one status.
    ///
    /// One item's failure never aborts the batch; every selected item
    /// gets a report.
    pub async fn index_all(
        &self,
        items: &[KnowledgeItem],
        status: Option<ItemStatus>,
    ) -> Vec<ItemReport> {
        let mut reports = Vec::new();

        for item in items {
            if let Some(want) = status {
                if item.status != want {
                    continue;
                }
            }

            let result = self.index_item(item).await;
            if !result.success {
                warn!(
                    knowledge_id = item.id,
                    title = %item.title,
                    error = result.error.as_deref().unwrap_or(""),
                    "indexing failed"
                );
            }
            reports.push(ItemReport {
                knowledge_id: item.id,
                title: item.title.clone(),
                result,
            });
        }

        reports
    }
}

/// Combine per-document hashes (already ordered by `document_id`) into one
/// fingerprint. A single document keeps its own hash so the common
/// one-file case stays directly comparable.
fn aggregate_hash<'a>(hashes: impl ExactSizeIterator<Item = &'a str>) -> String {
    if hashes.len() == 1 {
        let mut hashes = hashes;
        return hashes.next().unwrap_or_default().to_string();
    }
    let mut hasher = Sha256::new();
    for h in hashes {
        hasher.update(h.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, Config, EmbeddingConfig, IndexConfig, LoaderConfig};
    use crate::index::memory::MemoryIndex;
    use crate::loader::content_hash;
    use crate::models::DocumentType;
    use async_trait::async_trait;
    use std::fs;

    /// Deterministic fake provider: vector components derived from byte
    /// sums so identical text always embeds identically.
    struct StubProvider;

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let sum: u32 = t.bytes().map(u32::from).sum();
                    vec![
                        (sum % 97) as f32,
                        (sum % 89) as f32,
                        (t.len() % 83) as f32,
                        1.0,
                    ]
                })
                .collect())
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            index: IndexConfig {
                persist_directory: dir.to_path_buf(),
                collection_name: "knowledge".to_string(),
            },
            chunking: ChunkingConfig {
                chunk_size: 200,
                chunk_overlap: 40,
            },
            loader: LoaderConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }

    fn make_indexer(dir: &std::path::Path, index: Arc<MemoryIndex>) -> Indexer {
        Indexer::new(&test_config(dir), Arc::new(StubProvider), index).unwrap()
    }

    fn item(id: i64, uri: &str, document_type: DocumentType) -> KnowledgeItem {
        KnowledgeItem {
            id,
            title: format!("item-{}", id),
            uri: uri.to_string(),
            document_type,
            category: None,
            tags: None,
            content_hash: None,
            status: ItemStatus::Pending,
            last_fetched_at: None,
            indexed_at: None,
        }
    }

    #[tokio::test]
    async fn indexes_markdown_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        fs::write(&path, "Alpha paragraph.\n\nBeta paragraph.").unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index.clone());

        let result = indexer
            .index_item(&item(1, path.to_str().unwrap(), DocumentType::Markdown))
            .await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.chunks_indexed >= 1);
        assert_eq!(
            result.content_hash,
            content_hash("Alpha paragraph.\n\nBeta paragraph.")
        );

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_chunks as usize, result.chunks_indexed);
        assert_eq!(stats.unique_knowledge_items, 1);
    }

    #[tokio::test]
    async fn missing_source_is_reported_not_raised() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index);

        let result = indexer
            .index_item(&item(1, "/no/such/file.md", DocumentType::Markdown))
            .await;
        assert!(!result.success);
        assert_eq!(result.chunks_indexed, 0);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn empty_source_fails_with_no_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.md");
        fs::write(&path, "   \n\n  ").unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index);

        let result = indexer
            .index_item(&item(1, path.to_str().unwrap(), DocumentType::Markdown))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no content to index"));
    }

    #[tokio::test]
    async fn pdf_items_fail_as_unsupported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index);

        let result = indexer
            .index_item(&item(1, "./report.pdf", DocumentType::Pdf))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("pdf"));
    }

    #[tokio::test]
    async fn reindex_replaces_instead_of_accumulating() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        let long = "A paragraph of filler text. ".repeat(30);
        fs::write(&path, &long).unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index.clone());
        let knowledge = item(1, path.to_str().unwrap(), DocumentType::Markdown);

        let first = indexer.index_item(&knowledge).await;
        assert!(first.success);
        assert!(first.chunks_indexed > 1);

        fs::write(&path, "Shrunk to one chunk.").unwrap();
        let second = indexer.index_item(&knowledge).await;
        assert!(second.success);
        assert_eq!(second.chunks_indexed, 1);
        assert_ne!(first.content_hash, second.content_hash);

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 1);
    }

    #[tokio::test]
    async fn folder_hash_is_order_stable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let folder = tmp.path().join("docs");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("z.md"), "Zulu content.").unwrap();
        fs::write(folder.join("a.md"), "Alpha content.").unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index);
        let knowledge = item(1, folder.to_str().unwrap(), DocumentType::Folder);

        let first = indexer.index_item(&knowledge).await;
        let second = indexer.index_item(&knowledge).await;
        assert!(first.success && second.success);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn remove_distinguishes_present_from_absent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        fs::write(&path, "Content to remove.").unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index.clone());

        assert!(!indexer.remove(1).await.unwrap());

        let result = indexer
            .index_item(&item(1, path.to_str().unwrap(), DocumentType::Markdown))
            .await;
        assert!(result.success);

        assert!(indexer.remove(1).await.unwrap());
        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 0);
    }

    #[tokio::test]
    async fn index_all_continues_past_failures() {
        let tmp = tempfile::TempDir::new().unwrap();
        let good = tmp.path().join("good.md");
        fs::write(&good, "Readable content.").unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index);

        let items = vec![
            item(1, "/no/such/file.md", DocumentType::Markdown),
            item(2, good.to_str().unwrap(), DocumentType::Markdown),
        ];
        let reports = indexer.index_all(&items, None).await;

        assert_eq!(reports.len(), 2);
        assert!(!reports[0].result.success);
        assert!(reports[0].result.error.is_some());
        assert!(reports[1].result.success);
    }

    #[tokio::test]
    async fn index_all_filters_by_status() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        fs::write(&path, "Some content.").unwrap();

        let index = Arc::new(MemoryIndex::new());
        let indexer = make_indexer(tmp.path(), index);

        let mut active = item(1, path.to_str().unwrap(), DocumentType::Markdown);
        active.status = ItemStatus::Active;
        let pending = item(2, path.to_str().unwrap(), DocumentType::Markdown);

        let reports = indexer
            .index_all(&[active, pending], Some(ItemStatus::Active))
            .await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].knowledge_id, 1);
    }
}
