//! Checklist parser for agent task lists.
//!
//! Agents keep a small Markdown checklist in their state directory:
//! ```text
//! # Phase 2: Auth
//! - [x] Scaffold login page
//! - [/] Wire session cookie
//! - [ ] Logout button
//! ```
//!
//! Lines of the form "bullet, bracketed one-character marker, free text"
//! become [`ChecklistItem`]s. Everything else is ignored, so parsing never
//! fails on malformed content.

use regex::Regex;
use std::sync::LazyLock;

use conductor_models::{Checklist, ChecklistItem, ChecklistStatus, UNTITLED_CHECKLIST};

use crate::error::ChecklistError;

/// Bullet, `[` marker `]`, text. The marker may be empty.
static ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+\[(.?)\]\s+(\S.*)$").expect("Invalid item regex"));

/// Level-1 heading only (`# Title`, not `## Title`).
static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s+(\S.*)$").expect("Invalid title regex"));

/// Maps a marker to a status. Anything unrecognized is pending.
fn status_for(marker: &str) -> ChecklistStatus {
    match marker {
        "x" | "X" => ChecklistStatus::Completed,
        "/" => ChecklistStatus::InProgress,
        _ => ChecklistStatus::Pending,
    }
}

/// Parse checklist text into an ordered list of items.
///
/// # Example
/// ```
/// use conductor_core::checklist::parse;
/// use conductor_models::ChecklistStatus;
///
/// let checklist = parse("- [x] Task A\n- [ ] Task B\n- [/] Task C\n- not a task");
/// assert_eq!(checklist.items.len(), 3);
/// assert_eq!(checklist.items[2].status, ChecklistStatus::InProgress);
/// ```
pub fn parse(text: &str) -> Checklist {
    let mut title = None;
    let mut items = Vec::new();

    for (position, line) in text.lines().enumerate() {
        if title.is_none() {
            if let Some(cap) = TITLE_REGEX.captures(line) {
                title = Some(cap[1].trim_end().to_string());
                continue;
            }
        }

        if let Some(cap) = ITEM_REGEX.captures(line) {
            items.push(ChecklistItem {
                description: cap[2].trim_end().to_string(),
                status: status_for(&cap[1]),
                position,
            });
        }
    }

    Checklist {
        title: title.unwrap_or_else(|| UNTITLED_CHECKLIST.to_string()),
        items,
    }
}

/// Parse raw bytes. Fails only when the bytes are not UTF-8.
pub fn parse_bytes(bytes: &[u8]) -> Result<Checklist, ChecklistError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(parse(text))
}

/// Rewrite the marker of the item at `position` (a zero-based line index).
///
/// Only the marker changes; every other byte is preserved. Returns `None`
/// if that line is not a checklist item.
pub fn set_status(text: &str, position: usize, status: ChecklistStatus) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 1);
    let mut rewritten = false;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        if index != position {
            out.push_str(line);
            continue;
        }

        let body_len = line.trim_end_matches(['\n', '\r']).len();
        let (body, ending) = line.split_at(body_len);
        let cap = ITEM_REGEX.captures(body)?;
        let marker = cap.get(1)?;

        out.push_str(&body[..marker.start()]);
        out.push(status.marker());
        out.push_str(&body[marker.end()..]);
        out.push_str(ending);
        rewritten = true;
    }

    rewritten.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let checklist = parse("- [x] Task A\n- [ ] Task B\n- [/] Task C\n- not a task");

        assert_eq!(checklist.items.len(), 3);
        assert_eq!(checklist.items[0].description, "Task A");
        assert_eq!(checklist.items[0].status, ChecklistStatus::Completed);
        assert_eq!(checklist.items[1].description, "Task B");
        assert_eq!(checklist.items[1].status, ChecklistStatus::Pending);
        assert_eq!(checklist.items[2].description, "Task C");
        assert_eq!(checklist.items[2].status, ChecklistStatus::InProgress);
    }

    #[test]
    fn test_positions_are_line_indices() {
        let checklist = parse("# Title\n\n- [x] one\nprose\n- [ ] two\n");
        let positions: Vec<_> = checklist.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![2, 4]);
    }

    #[test]
    fn test_title_from_first_h1() {
        let checklist = parse("## Not this\n# Phase 2 Tasks\n# Second\n- [ ] a");
        assert_eq!(checklist.title, "Phase 2 Tasks");
    }

    #[test]
    fn test_default_title() {
        assert_eq!(parse("- [ ] a").title, UNTITLED_CHECKLIST);
        assert_eq!(parse("").title, UNTITLED_CHECKLIST);
    }

    #[test]
    fn test_empty_input_has_no_items() {
        let checklist = parse("");
        assert!(checklist.items.is_empty());
        assert!(!checklist.is_complete());
    }

    #[test]
    fn test_unknown_markers_are_pending() {
        let checklist = parse("- [?] odd\n* [] blank\n+ [-] dash");
        assert_eq!(checklist.items.len(), 3);
        assert!(checklist
            .items
            .iter()
            .all(|i| i.status == ChecklistStatus::Pending));
    }

    #[test]
    fn test_uppercase_x_and_indentation() {
        let checklist = parse("  - [X] nested done\n\t* [/] tabbed");
        assert_eq!(checklist.items[0].status, ChecklistStatus::Completed);
        assert_eq!(checklist.items[1].status, ChecklistStatus::InProgress);
    }

    #[test]
    fn test_non_matching_lines_ignored() {
        let checklist = parse("-[x] no space\n- [xx] two chars\n1. [x] numbered\n- [x]\nplain");
        assert!(checklist.items.is_empty());
    }

    #[test]
    fn test_crlf_input() {
        let checklist = parse("- [x] a\r\n- [ ] b\r\n");
        assert_eq!(checklist.items.len(), 2);
        assert_eq!(checklist.items[0].description, "a");
    }

    #[test]
    fn test_parse_bytes_rejects_binary() {
        assert!(parse_bytes(&[0xff, 0xfe, 0x00]).is_err());
        assert_eq!(parse_bytes(b"- [x] ok").unwrap().items.len(), 1);
    }

    #[test]
    fn test_set_status_rewrites_only_marker() {
        let text = "# T\n- [ ] first\r\n- [/] second\n";
        let updated = set_status(text, 2, ChecklistStatus::Completed).unwrap();
        assert_eq!(updated, "# T\n- [ ] first\r\n- [x] second\n");

        // Idempotent
        let again = set_status(&updated, 2, ChecklistStatus::Completed).unwrap();
        assert_eq!(again, updated);
    }

    #[test]
    fn test_set_status_fills_empty_marker() {
        let updated = set_status("- [] todo", 0, ChecklistStatus::InProgress).unwrap();
        assert_eq!(updated, "- [/] todo");
    }

    #[test]
    fn test_set_status_non_item_line() {
        assert!(set_status("# T\n- [ ] a", 0, ChecklistStatus::Completed).is_none());
        assert!(set_status("- [ ] a", 5, ChecklistStatus::Completed).is_none());
    }
}
