//! Core data models used throughout the indexing and retrieval pipeline.
//!
//! These types represent the knowledge items, loaded documents, chunks, and
//! results that flow through the loader, splitter, vector index, and search
//! service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of source a knowledge item points at.
///
/// Closed set: adding a new type requires explicit handling in the loader's
/// exhaustive match. `Pdf` is declared for forward compatibility but loading
/// it is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Markdown,
    Website,
    Folder,
    Pdf,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentType::Markdown => "markdown",
            DocumentType::Website => "website",
            DocumentType::Folder => "folder",
            DocumentType::Pdf => "pdf",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(DocumentType::Markdown),
            "website" => Ok(DocumentType::Website),
            "folder" => Ok(DocumentType::Folder),
            "pdf" => Ok(DocumentType::Pdf),
            other => Err(format!(
                "unknown document type: '{}'. Use markdown, website, folder, or pdf.",
                other
            )),
        }
    }
}

/// Lifecycle status of a knowledge item in the external metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Active,
    Error,
    Archived,
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "active" => Ok(ItemStatus::Active),
            "error" => Ok(ItemStatus::Error),
            "archived" => Ok(ItemStatus::Archived),
            other => Err(format!(
                "unknown status: '{}'. Use pending, active, error, or archived.",
                other
            )),
        }
    }
}

/// Mirror of the knowledge-item record owned by the external metadata store.
///
/// The core reads these fields to drive indexing; it never owns the record's
/// lifecycle. Updating `content_hash`/`status`/`indexed_at` after an indexing
/// attempt is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: i64,
    pub title: String,
    pub uri: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated tag list.
    #[serde(default)]
    pub tags: Option<String>,
    /// Fingerprint from the last successful indexing, if any.
    #[serde(default)]
    pub content_hash: Option<String>,
    pub status: ItemStatus,
    #[serde(default)]
    pub last_fetched_at: Option<i64>,
    #[serde(default)]
    pub indexed_at: Option<i64>,
}

/// One logical document discovered under a source URI.
///
/// Ephemeral: produced by the loader, consumed immediately by the splitter,
/// never persisted.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Full normalized text.
    pub content: String,
    /// Stable identifier derived from the source (path or URL); the same
    /// file always maps to the same id across runs.
    pub document_id: String,
    /// SHA-256 hex digest of `content` bytes, used for change detection.
    pub content_hash: String,
    pub source_uri: String,
    /// Parsed from frontmatter or the HTML `<title>`, when present.
    pub title: Option<String>,
}

/// Metadata carried by every chunk, inherited from the owning knowledge item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub knowledge_id: i64,
    pub title: String,
    pub uri: String,
    pub document_type: DocumentType,
    pub category: Option<String>,
    pub tags: Option<String>,
    /// Ordinal among chunks of the same document.
    pub chunk_index: i64,
    /// Byte offset of the chunk into the source content.
    pub start_index: i64,
    /// Unix timestamp of the indexing run that produced this chunk.
    pub indexed_at: i64,
}

/// A bounded-length contiguous span of a document's text, the unit of
/// embedding and retrieval. Ephemeral: persisted only as a vector index
/// entry.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub content: String,
    /// True byte offset into the source content. Monotonically
    /// non-decreasing across `chunk_index`.
    pub start_index: usize,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

/// Outcome of one knowledge-item indexing attempt.
#[derive(Debug, Clone, Serialize)]
pub struct IndexingResult {
    pub success: bool,
    pub chunks_indexed: usize,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexingResult {
    pub fn ok(chunks_indexed: usize, content_hash: String) -> Self {
        Self {
            success: true,
            chunks_indexed,
            content_hash,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            chunks_indexed: 0,
            content_hash: String::new(),
            error: Some(error.into()),
        }
    }
}

/// A ranked hit returned by the search service.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub knowledge_id: i64,
    pub title: String,
    pub uri: String,
    /// Similarity in `[0, 1]`, higher = more relevant.
    pub score: f64,
    pub chunk_index: i64,
}
