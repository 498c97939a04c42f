//! Best-effort extraction from free-form completion narratives.
//!
//! Agents may leave a Markdown walkthrough next to their checklist. This
//! module scans it for three things:
//! - section headings, for a table of contents
//! - embedded media references (`![alt](shot.png)`, `[demo](run.webm)`)
//! - per-test outcome lines marked with ✅ (pass), ❌ (fail) or ⏭️ (skip)
//!
//! Nothing here fails: anything that does not match is simply absent.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Regex for ATX headings.
static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(\S.*?)\s*#*\s*$").expect("Invalid heading regex"));

/// Regex for Markdown links and images, with an optional quoted title.
static LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("Invalid link regex")
});

const PASS_ICON: char = '✅';
const FAIL_ICON: char = '❌';
const SKIP_ICON: char = '⏭';

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// A section heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1 for `#`, 2 for `##`, ...
    pub level: u8,
    pub text: String,
}

/// Kind of embedded media, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a path by extension. Query strings and fragments are ignored.
    pub fn classify(target: &str) -> Option<Self> {
        let clean = target.split(['?', '#']).next().unwrap_or(target);
        let ext = Path::new(clean).extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// A media reference found in the narrative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Link target as written.
    pub target: String,
    /// Alt or link text.
    pub label: String,
}

/// Result of one test line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
}

/// A test outcome line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub name: String,
    pub result: TestResult,
}

/// Everything extracted from a narrative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrativeSummary {
    pub headings: Vec<Heading>,
    pub media: Vec<MediaRef>,
    pub tests: Vec<TestOutcome>,
}

impl NarrativeSummary {
    fn count(&self, result: TestResult) -> usize {
        self.tests.iter().filter(|t| t.result == result).count()
    }

    pub fn passed(&self) -> usize {
        self.count(TestResult::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(TestResult::Fail)
    }

    pub fn skipped(&self) -> usize {
        self.count(TestResult::Skip)
    }

    /// Number of evidence artifacts (screenshots and recordings).
    pub fn evidence_count(&self) -> usize {
        self.media.len()
    }
}

/// Scan a narrative document.
pub fn scan(text: &str) -> NarrativeSummary {
    let mut summary = NarrativeSummary::default();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(cap) = HEADING_REGEX.captures(line) {
            summary.headings.push(Heading {
                level: cap[1].len() as u8,
                text: cap[2].to_string(),
            });
            continue;
        }

        for cap in LINK_REGEX.captures_iter(line) {
            let target = &cap[3];
            if let Some(kind) = MediaKind::classify(target) {
                summary.media.push(MediaRef {
                    kind,
                    target: target.to_string(),
                    label: cap[2].to_string(),
                });
            }
        }

        if let Some(outcome) = test_outcome(line) {
            summary.tests.push(outcome);
        }
    }

    summary
}

/// Reads a test outcome from a bullet or table row carrying one of the icons.
fn test_outcome(line: &str) -> Option<TestOutcome> {
    let result = if line.contains(FAIL_ICON) {
        TestResult::Fail
    } else if line.contains(PASS_ICON) {
        TestResult::Pass
    } else if line.contains(SKIP_ICON) {
        TestResult::Skip
    } else {
        return None;
    };

    let stripped: String = line
        .chars()
        .filter(|c| ![PASS_ICON, FAIL_ICON, SKIP_ICON, '\u{fe0f}'].contains(c))
        .collect();

    let name = stripped
        .split('|')
        .map(|cell| cell.trim().trim_start_matches(['-', '*', '+']).trim())
        .find(|cell| !cell.is_empty())
        .unwrap_or("")
        .to_string();

    Some(TestOutcome { name, result })
}
