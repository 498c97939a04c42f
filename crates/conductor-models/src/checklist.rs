//! Parsed checklist types.

use serde::{Deserialize, Serialize};

/// Title used when a checklist has no level-1 heading.
pub const UNTITLED_CHECKLIST: &str = "Untitled";

/// Status of one checklist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    /// `[ ]` or any unrecognized marker.
    #[default]
    Pending,
    /// `[/]`
    InProgress,
    /// `[x]`
    Completed,
}

impl ChecklistStatus {
    /// Returns the marker character written between the brackets.
    pub fn marker(&self) -> char {
        match self {
            ChecklistStatus::Pending => ' ',
            ChecklistStatus::InProgress => '/',
            ChecklistStatus::Completed => 'x',
        }
    }
}

/// One task line of an agent's checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Free-text description.
    pub description: String,
    /// Current status.
    pub status: ChecklistStatus,
    /// Zero-based line index in the source document.
    pub position: usize,
}

/// A parsed checklist document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    /// First level-1 heading, or [`UNTITLED_CHECKLIST`].
    pub title: String,
    /// Items in document order.
    pub items: Vec<ChecklistItem>,
}

impl Default for Checklist {
    fn default() -> Self {
        Self {
            title: UNTITLED_CHECKLIST.to_string(),
            items: Vec::new(),
        }
    }
}

impl Checklist {
    /// Total number of items.
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Number of items with the given status.
    pub fn count(&self, status: ChecklistStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// True when there is at least one item and every item is completed.
    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.count(ChecklistStatus::Completed) == self.items.len()
    }

    /// The first in-progress item, if any.
    pub fn current(&self) -> Option<&ChecklistItem> {
        self.items
            .iter()
            .find(|i| i.status == ChecklistStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, status: ChecklistStatus, position: usize) -> ChecklistItem {
        ChecklistItem {
            description: description.to_string(),
            status,
            position,
        }
    }

    #[test]
    fn test_empty_checklist_is_not_complete() {
        let checklist = Checklist::default();
        assert_eq!(checklist.total(), 0);
        assert!(!checklist.is_complete());
        assert_eq!(checklist.title, UNTITLED_CHECKLIST);
    }

    #[test]
    fn test_counts_and_current() {
        let checklist = Checklist {
            title: "Build".to_string(),
            items: vec![
                item("a", ChecklistStatus::Completed, 0),
                item("b", ChecklistStatus::InProgress, 1),
                item("c", ChecklistStatus::Pending, 2),
                item("d", ChecklistStatus::InProgress, 3),
            ],
        };

        assert_eq!(checklist.count(ChecklistStatus::Completed), 1);
        assert_eq!(checklist.count(ChecklistStatus::InProgress), 2);
        assert_eq!(checklist.count(ChecklistStatus::Pending), 1);
        assert_eq!(checklist.current().map(|i| i.description.as_str()), Some("b"));
        assert!(!checklist.is_complete());
    }

    #[test]
    fn test_markers() {
        assert_eq!(ChecklistStatus::Completed.marker(), 'x');
        assert_eq!(ChecklistStatus::InProgress.marker(), '/');
        assert_eq!(ChecklistStatus::Pending.marker(), ' ');
    }
}
