//! kbindex: local-first indexing and semantic search for a knowledge base.
//!
//! The pipeline turns knowledge items (a markdown file, a web page, or a
//! folder of documents) into overlapping text chunks, embeds them through a
//! configurable provider, and stores them in a durable vector index that
//! answers filtered nearest-neighbor queries.
//!
//! Module map:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML configuration, validated at startup |
//! | [`models`] | Shared data types (items, documents, chunks, results) |
//! | [`loader`] | Fetch and normalize source documents |
//! | [`frontmatter`] | Markdown frontmatter metadata extraction |
//! | [`splitter`] | Deterministic overlapping chunking |
//! | [`embedding`] | Embedding providers and vector math |
//! | [`index`] | Vector index trait, SQLite and in-memory backends |
//! | [`indexer`] | Load/split/embed/upsert coordination |
//! | [`search`] | Query embedding and result mapping |
//! | [`stats`] | Collection statistics |

pub mod config;
pub mod embedding;
pub mod error;
pub mod frontmatter;
pub mod index;
pub mod indexer;
pub mod loader;
pub mod models;
pub mod search;
pub mod splitter;
pub mod stats;

pub use error::{KbError, Result};
