//! Document loading for the three supported source kinds.
//!
//! The loader turns a `(uri, document_type)` pair into normalized
//! [`LoadedDocument`]s with content fingerprints:
//!
//! - **markdown**: one local file or remote URL; an optional frontmatter
//!   block may override title/document_id/source_url.
//! - **website**: one fetched page, HTML converted to plain text with
//!   script/style content discarded and the `<title>` extracted.
//! - **folder**: a recursive walk over files with supported extensions,
//!   one document per file; unreadable files are collected as per-file
//!   failures, never fatal to the batch.
//!
//! Dispatch is an exhaustive match over [`DocumentType`], so adding a new
//! type forces explicit handling here. Remote fetches are bounded by the
//! configured timeout.

use std::path::Path;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LoaderConfig;
use crate::error::{KbError, Result};
use crate::frontmatter;
use crate::models::{DocumentType, LoadedDocument};

/// Extensions the folder loader picks up.
const INCLUDE_GLOBS: &[&str] = &["**/*.md", "**/*.markdown", "**/*.txt", "**/*.html"];
/// Never worth indexing; mirrors the usual repository noise.
const EXCLUDE_GLOBS: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A per-file load error inside a folder source.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub source: String,
    pub error: String,
}

/// Everything a single load call produced.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<LoadedDocument>,
    pub failures: Vec<LoadFailure>,
}

/// Fetches and normalizes raw text for declared sources.
pub struct DocumentLoader {
    fetch_timeout: Duration,
}

impl DocumentLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    /// Load all documents under `uri` for the given type.
    ///
    /// Fails with [`KbError::SourceNotFound`] when the path/URL does not
    /// resolve and [`KbError::UnsupportedDocumentType`] for types without
    /// load support.
    pub async fn load(&self, uri: &str, document_type: DocumentType) -> Result<LoadOutcome> {
        match document_type {
            DocumentType::Markdown => self.load_markdown(uri).await,
            DocumentType::Website => self.load_website(uri).await,
            DocumentType::Folder => self.load_folder(uri),
            DocumentType::Pdf => Err(KbError::UnsupportedDocumentType("pdf".to_string())),
        }
    }

    async fn load_markdown(&self, uri: &str) -> Result<LoadOutcome> {
        let raw = if is_remote(uri) {
            self.fetch_url(uri).await?
        } else {
            read_local_file(Path::new(uri))?
        };

        let (fm, body) = frontmatter::parse(&raw);
        let fm = fm.unwrap_or_default();
        let content = body.to_string();

        let document = LoadedDocument {
            content_hash: content_hash(&content),
            document_id: fm.document_id.unwrap_or_else(|| uri.to_string()),
            source_uri: fm.source_url.unwrap_or_else(|| uri.to_string()),
            title: fm.title,
            content,
        };

        Ok(LoadOutcome {
            documents: vec![document],
            failures: Vec::new(),
        })
    }

    async fn load_website(&self, uri: &str) -> Result<LoadOutcome> {
        let html = self.fetch_url(uri).await?;
        let (content, title) = html_to_text(&html);

        let document = LoadedDocument {
            content_hash: content_hash(&content),
            document_id: uri.to_string(),
            source_uri: uri.to_string(),
            title,
            content,
        };

        Ok(LoadOutcome {
            documents: vec![document],
            failures: Vec::new(),
        })
    }

    fn load_folder(&self, uri: &str) -> Result<LoadOutcome> {
        let root = Path::new(uri);
        if !root.is_dir() {
            return Err(KbError::SourceNotFound(uri.to_string()));
        }

        let include = build_globset(INCLUDE_GLOBS);
        let exclude = build_globset(EXCLUDE_GLOBS);

        let mut outcome = LoadOutcome::default();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    outcome.failures.push(LoadFailure {
                        source: uri.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();
            if exclude.is_match(rel_str.as_ref()) || !include.is_match(rel_str.as_ref()) {
                continue;
            }

            match load_folder_file(path) {
                Ok(doc) => outcome.documents.push(doc),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    outcome.failures.push(LoadFailure {
                        source: path.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // Deterministic ordering for stable aggregate hashing downstream.
        outcome.documents.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        debug!(
            folder = uri,
            loaded = outcome.documents.len(),
            skipped = outcome.failures.len(),
            "folder scan complete"
        );

        Ok(outcome)
    }

    async fn fetch_url(&self, uri: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(|e| KbError::Fetch {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;

        let response = client.get(uri).send().await.map_err(|e| {
            if e.is_connect() || e.is_builder() {
                KbError::SourceNotFound(uri.to_string())
            } else {
                KbError::Fetch {
                    uri: uri.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KbError::SourceNotFound(format!("{} (HTTP {})", uri, status)));
        }

        response.text().await.map_err(|e| KbError::Fetch {
            uri: uri.to_string(),
            message: e.to_string(),
        })
    }
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

fn read_local_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            KbError::SourceNotFound(path.display().to_string())
        } else {
            KbError::Io(e)
        }
    })
}

fn load_folder_file(path: &Path) -> Result<LoadedDocument> {
    let raw = read_local_file(path)?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let (content, title) = match ext.as_str() {
        "md" | "markdown" => {
            let (fm, body) = frontmatter::parse(&raw);
            let title = fm.and_then(|f| f.title);
            (body.to_string(), title)
        }
        "html" => html_to_text(&raw),
        _ => (raw, None),
    };

    Ok(LoadedDocument {
        content_hash: content_hash(&content),
        document_id: path.display().to_string(),
        source_uri: path.display().to_string(),
        title,
        content,
    })
}

/// SHA-256 hex digest of the content bytes. Stable: identical content
/// always reproduces the identical hash.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // Patterns are compile-time constants; they always parse.
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Convert an HTML page to plain text, discarding script/style content and
/// extracting the first `<title>` when present. Block-level tags become
/// line breaks so paragraph structure survives for the splitter.
fn html_to_text(html: &str) -> (String, Option<String>) {
    let lower = html.to_ascii_lowercase();
    let mut out = String::new();
    let mut title: Option<String> = None;
    let mut i = 0usize;

    while i < html.len() {
        let Some(lt_rel) = lower[i..].find('<') else {
            append_text(&mut out, &html[i..]);
            break;
        };
        let lt = i + lt_rel;
        append_text(&mut out, &html[i..lt]);

        // Comments can legally contain '>'.
        if lower[lt..].starts_with("<!--") {
            match lower[lt..].find("-->") {
                Some(rel) => {
                    i = lt + rel + 3;
                    continue;
                }
                None => break,
            }
        }

        let Some(gt_rel) = lower[lt..].find('>') else {
            break; // unterminated tag: drop the remainder
        };
        let gt = lt + gt_rel;
        let tag = &lower[lt + 1..gt];
        let closing = tag.starts_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");
        i = gt + 1;

        match name {
            "script" | "style" if !closing => {
                let close = format!("</{}", name);
                match lower[i..].find(&close) {
                    Some(rel) => i += rel, // next iteration consumes the closing tag
                    None => break,
                }
            }
            "title" if !closing && title.is_none() => {
                if let Some(rel) = lower[i..].find("</title") {
                    let t = decode_entities(html[i..i + rel].trim());
                    if !t.is_empty() {
                        title = Some(t);
                    }
                    i += rel;
                }
            }
            "br" | "li" | "tr" => push_break(&mut out, false),
            "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "table"
            | "section" | "article" | "blockquote" | "pre" => push_break(&mut out, true),
            _ => {}
        }
    }

    while out.ends_with('\n') || out.ends_with(' ') {
        out.pop();
    }

    (out, title)
}

/// Append a text segment with whitespace runs collapsed to single spaces.
fn append_text(out: &mut String, raw: &str) {
    let decoded = decode_entities(raw);
    let mut words = decoded.split_whitespace();
    let Some(first) = words.next() else {
        return;
    };
    if !out.is_empty() && !out.ends_with('\n') {
        out.push(' ');
    }
    out.push_str(first);
    for word in words {
        out.push(' ');
        out.push_str(word);
    }
}

/// Insert a line break (`hard` = paragraph break) without stacking blanks.
fn push_break(out: &mut String, hard: bool) {
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() {
        return;
    }
    if hard {
        if out.ends_with("\n\n") {
            return;
        }
        if out.ends_with('\n') {
            out.push('\n');
        } else {
            out.push_str("\n\n");
        }
    } else if !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Minimal entity decoding; `&amp;` goes last so it cannot create new
/// entities.
fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
