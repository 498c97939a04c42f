//! Named memory blocks embedded in a Markdown document.
//!
//! A block is a fenced JSON payload between two HTML comments:
//!
//! ````text
//! <!-- conductor:block coordination -->
//! ```json
//! { "revision": 3, ... }
//! ```
//! <!-- conductor:end coordination -->
//! ````
//!
//! The comments keep the block invisible in rendered Markdown while leaving
//! it easy for agents to find. Everything outside the markers belongs to the
//! document's human authors and is never rewritten.

use std::ops::Range;

use crate::error::{PersistenceError, Result};

/// Key of the block holding the current phase and heartbeats.
pub const COORDINATION_BLOCK: &str = "coordination";

/// Key prefix for archived (superseded) phases.
pub const PHASE_ARCHIVE_PREFIX: &str = "phase:";

fn start_marker(key: &str) -> String {
    format!("<!-- conductor:block {} -->", key)
}

fn end_marker(key: &str) -> String {
    format!("<!-- conductor:end {} -->", key)
}

fn corrupt(key: &str, reason: impl Into<String>) -> PersistenceError {
    PersistenceError::CorruptBlock {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Keys are single tokens so the markers stay unambiguous.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.chars().any(|c| c.is_whitespace()) || key.contains("--") {
        return Err(PersistenceError::InvalidData(format!(
            "invalid block key '{}'",
            key
        )));
    }
    Ok(())
}

/// Block key for an archived phase. Whitespace becomes `-` and dash runs collapse.
pub fn archive_key(phase_id: &str) -> String {
    let mut id = String::with_capacity(phase_id.len());
    for c in phase_id.chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if !(c == '-' && id.ends_with('-')) {
            id.push(c);
        }
    }
    format!("{}{}", PHASE_ARCHIVE_PREFIX, id)
}

/// Byte ranges of one block inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    /// Start of the start-marker line through the end of the end marker.
    pub outer: Range<usize>,
    /// Text between the two marker lines.
    pub inner: Range<usize>,
}

/// Lines of `doc` with the byte offset each starts at. Line text excludes
/// the terminator.
fn lines_with_offsets(doc: &str) -> impl Iterator<Item = (usize, &str)> {
    doc.split_inclusive('\n').scan(0, |offset, raw| {
        let start = *offset;
        *offset += raw.len();
        Some((start, raw.trim_end_matches(&['\n', '\r'][..])))
    })
}

/// The opening characters of a code fence line, if `line` is one.
fn fence_of(line: &str) -> Option<&'static str> {
    let line = line.trim_start();
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Locates a block. Markers count only as whole lines, and a start marker
/// inside a fenced code block of the surrounding prose is ignored.
///
/// # Errors
/// A start marker without a matching end marker is a corrupt block.
pub fn locate(doc: &str, key: &str) -> Result<Option<BlockSpan>> {
    let start = start_marker(key);
    let end = end_marker(key);

    let mut lines = lines_with_offsets(doc);
    let mut fence: Option<&str> = None;
    let mut found = None;
    for (offset, line) in lines.by_ref() {
        if let Some(open) = fence {
            if line.trim_start().starts_with(open) {
                fence = None;
            }
            continue;
        }
        if line.trim() == start {
            found = Some((offset, offset + line.len()));
            break;
        }
        fence = fence_of(line);
    }
    let Some((begin, after_start)) = found else {
        return Ok(None);
    };

    for (offset, line) in lines {
        if line.trim() == end {
            return Ok(Some(BlockSpan {
                outer: begin..offset + line.len(),
                inner: after_start..offset,
            }));
        }
    }
    Err(corrupt(key, "missing end marker"))
}

/// The JSON payload of a block, without markers or code fence.
pub fn extract(doc: &str, key: &str) -> Result<Option<String>> {
    let Some(span) = locate(doc, key)? else {
        return Ok(None);
    };
    let inner = doc[span.inner].trim();
    let payload = inner
        .strip_prefix("```json")
        .or_else(|| inner.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .ok_or_else(|| corrupt(key, "payload is not a fenced code block"))?;
    Ok(Some(payload.trim().to_string()))
}

/// Escapes `<` and `>` as JSON unicode escapes so no payload line can
/// read as a marker. Only valid for JSON, where both characters can only
/// occur inside strings.
pub fn escape_markup(payload: &str) -> String {
    payload.replace('<', "\\u003c").replace('>', "\\u003e")
}

/// Renders a complete block for `payload`.
pub fn render(key: &str, payload: &str) -> String {
    format!(
        "{}\n```json\n{}\n```\n{}",
        start_marker(key),
        escape_markup(payload.trim_end()),
        end_marker(key)
    )
}

/// Replaces the block in place, or appends it after a blank line.
///
/// Bytes outside the block are carried over unchanged.
pub fn upsert(doc: &str, key: &str, payload: &str) -> Result<String> {
    validate_key(key)?;
    let block = render(key, payload);

    if let Some(span) = locate(doc, key)? {
        let mut out = String::with_capacity(doc.len() + block.len());
        out.push_str(&doc[..span.outer.start]);
        out.push_str(&block);
        out.push_str(&doc[span.outer.end..]);
        return Ok(out);
    }

    let separator = if doc.is_empty() || doc.ends_with("\n\n") {
        ""
    } else if doc.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    };
    Ok(format!("{}{}{}\n", doc, separator, block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_block() {
        assert!(locate("# Notes\n", COORDINATION_BLOCK).unwrap().is_none());
        assert!(extract("# Notes\n", COORDINATION_BLOCK).unwrap().is_none());
    }

    #[test]
    fn test_append_to_document() {
        let doc = "# Project\n\nSome prose.";
        let updated = upsert(doc, COORDINATION_BLOCK, "{\"a\": 1}").unwrap();

        assert!(updated.starts_with(doc));
        assert_eq!(
            extract(&updated, COORDINATION_BLOCK).unwrap().as_deref(),
            Some("{\"a\": 1}")
        );
    }

    #[test]
    fn test_append_to_empty_document() {
        let updated = upsert("", "k", "{}").unwrap();
        assert!(updated.starts_with("<!-- conductor:block k -->"));
        assert!(updated.ends_with("<!-- conductor:end k -->\n"));
    }

    #[test]
    fn test_replace_preserves_surroundings() {
        let before = "# Title\n\nIntro paragraph.\n\n";
        let after = "\n\n## Notes\nHand-written notes stay.\n";
        let doc = format!("{}{}{}", before, render("k", "{\"v\": 1}"), after);

        let updated = upsert(&doc, "k", "{\"v\": 2}").unwrap();

        assert!(updated.starts_with(before));
        assert!(updated.ends_with(after));
        assert_eq!(extract(&updated, "k").unwrap().as_deref(), Some("{\"v\": 2}"));
        assert_eq!(updated.matches("conductor:block k").count(), 1);
    }

    #[test]
    fn test_blocks_are_independent() {
        let doc = upsert("", "a", "1").unwrap();
        let doc = upsert(&doc, "b", "2").unwrap();
        let doc = upsert(&doc, "a", "3").unwrap();

        assert_eq!(extract(&doc, "a").unwrap().as_deref(), Some("3"));
        assert_eq!(extract(&doc, "b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_end_marker_is_corrupt() {
        let doc = "<!-- conductor:block k -->\n```json\n{}\n```\n";
        assert!(matches!(
            locate(doc, "k"),
            Err(PersistenceError::CorruptBlock { .. })
        ));
    }

    #[test]
    fn test_unfenced_payload_is_corrupt() {
        let doc = "<!-- conductor:block k -->\n{}\n<!-- conductor:end k -->";
        assert!(extract(doc, "k").is_err());
    }

    #[test]
    fn test_inline_marker_in_prose_is_not_a_block() {
        let doc = "# Board\n\nAgents: look for `<!-- conductor:block k -->` below.\n\n";
        assert!(locate(doc, "k").unwrap().is_none());

        let updated = upsert(doc, "k", "{}").unwrap();
        assert!(updated.starts_with(doc));
        assert_eq!(extract(&updated, "k").unwrap().as_deref(), Some("{}"));

        let again = upsert(&updated, "k", "{\"v\": 2}").unwrap();
        assert!(again.starts_with(doc));
        assert_eq!(again.matches("conductor:block k").count(), 2);
    }

    #[test]
    fn test_fenced_marker_example_is_skipped() {
        let prose = "How the block looks:\n\n```text\n<!-- conductor:block k -->\n```\n\n";
        let doc = format!("{}{}\n", prose, render("k", "1"));

        let span = locate(&doc, "k").unwrap().unwrap();
        assert_eq!(span.outer.start, prose.len());
        assert_eq!(extract(&doc, "k").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_payload_cannot_end_block_early() {
        let payload = "{\"note\": \"<!-- conductor:end k -->\"}";
        let doc = upsert("", "k", payload).unwrap();

        assert!(!doc.contains("\"<!--"));
        let stored = extract(&doc, "k").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(value["note"], "<!-- conductor:end k -->");
    }

    #[test]
    fn test_invalid_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("two words").is_err());
        assert!(validate_key("a--b").is_err());
        assert!(validate_key("phase:P2").is_ok());
    }

    #[test]
    fn test_archive_key() {
        assert_eq!(archive_key("Phase 2"), "phase:Phase-2");
        assert!(validate_key(&archive_key("a -- b")).is_ok());
    }
}
