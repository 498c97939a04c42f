//! Derived per-poll agent status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRole};
use crate::checklist::{Checklist, ChecklistStatus};
use crate::ids::AgentId;

/// Snapshot of one agent's progress, recomputed every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: AgentId,
    pub role: AgentRole,
    /// Checklist title, if a checklist was read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    /// `total > 0 && completed == total`.
    pub is_complete: bool,
    /// Modification time of the checklist file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Not complete and unmodified for longer than the idle threshold.
    pub is_idle: bool,
    /// Seconds since the checklist was last modified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_secs: Option<u64>,
    /// Description of the first in-progress item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
}

impl AgentStatus {
    /// Status for an agent with no readable data: zero tasks, never idle.
    pub fn empty(agent: &Agent) -> Self {
        Self {
            agent_id: agent.id.clone(),
            role: agent.role,
            title: None,
            total: 0,
            completed: 0,
            in_progress: 0,
            pending: 0,
            is_complete: false,
            last_modified: None,
            is_idle: false,
            idle_secs: None,
            current_task: None,
        }
    }

    /// Derives a status from a parsed checklist and its modification time.
    pub fn from_checklist(
        agent: &Agent,
        checklist: &Checklist,
        last_modified: DateTime<Utc>,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> Self {
        let total = checklist.total();
        let completed = checklist.count(ChecklistStatus::Completed);
        let is_complete = total > 0 && completed == total;

        // Clock skew can put the mtime in the future; treat that as "just modified".
        let elapsed = (now - last_modified).to_std().unwrap_or(Duration::ZERO);
        let is_idle = !is_complete && elapsed > idle_threshold;

        Self {
            agent_id: agent.id.clone(),
            role: agent.role,
            title: Some(checklist.title.clone()),
            total,
            completed,
            in_progress: checklist.count(ChecklistStatus::InProgress),
            pending: checklist.count(ChecklistStatus::Pending),
            is_complete,
            last_modified: Some(last_modified),
            is_idle,
            idle_secs: Some(elapsed.as_secs()),
            current_task: checklist.current().map(|i| i.description.clone()),
        }
    }

    /// Completion percentage, rounded; 0 when there are no tasks.
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u8
    }

    /// True when nothing was read for this agent.
    pub fn has_data(&self) -> bool {
        self.last_modified.is_some()
    }
}
