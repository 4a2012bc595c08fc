//! Error taxonomy for the indexing and retrieval pipeline.
//!
//! Per-document and per-item failures during bulk operations are captured
//! into structured results (see [`IndexingResult`](crate::models::IndexingResult))
//! rather than propagated; the variants here cover everything that *is*
//! raised: caller mistakes (configuration, arguments), unresolvable sources,
//! and storage failures.

use thiserror::Error;

/// Errors produced by the kbindex core.
#[derive(Debug, Error)]
pub enum KbError {
    /// The source URI did not resolve (missing file, unreachable URL,
    /// non-success HTTP status).
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// The caller passed a document type the loader does not handle.
    #[error("unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    /// A load succeeded but produced no text. Reported, never silently
    /// treated as success: an empty document is almost always a
    /// misconfiguration.
    #[error("no content to index")]
    EmptyContent,

    /// Invalid configuration (e.g. `chunk_overlap >= chunk_size`).
    /// Raised at construction time, not per call.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid call argument (e.g. `n_results == 0`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector index read/write failure. Not retried by the core; retry
    /// policy belongs to the caller.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Remote fetch failed (timeout, connection error).
    #[error("fetch failed for {uri}: {message}")]
    Fetch { uri: String, message: String },

    /// Embedding provider failure (API error, retries exhausted,
    /// provider disabled).
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KbError>;
