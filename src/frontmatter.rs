//! Loose YAML-like frontmatter parsing for markdown sources.
//!
//! A frontmatter block is a leading `---` fence followed by `key: value`
//! lines and a closing `---`. Only the keys the loader cares about are
//! recognized (`title`, `document_id`, `source_url`); everything else is
//! ignored. Malformed frontmatter is treated as absent and the whole input
//! is returned as body, so a stray `---` at the top of a document can never
//! make indexing fail.

/// Recognized frontmatter keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub document_id: Option<String>,
    pub source_url: Option<String>,
}

/// Split `content` into an optional frontmatter block and the remaining body.
///
/// Returns `(None, content)` when no well-formed block is present.
pub fn parse(content: &str) -> (Option<Frontmatter>, &str) {
    let rest = match content.strip_prefix("---") {
        Some(r) => r,
        None => return (None, content),
    };

    // The opening fence must be its own line.
    let rest = match rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) {
        Some(r) => r,
        None => return (None, content),
    };

    let (block, body) = match find_closing_fence(rest) {
        Some(split) => split,
        None => return (None, content),
    };

    let mut fm = Frontmatter::default();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = unquote(value.trim());
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "title" => fm.title = Some(value.to_string()),
            "document_id" | "id" => fm.document_id = Some(value.to_string()),
            "source_url" | "url" => fm.source_url = Some(value.to_string()),
            _ => {}
        }
    }

    (Some(fm), body)
}

/// Locate the closing `---` line and split the input around it.
fn find_closing_fence(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return Some((&rest[..offset], body));
        }
        offset += line.len();
    }
    None
}

fn unquote(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}
