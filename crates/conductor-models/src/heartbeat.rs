//! Per-agent liveness records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentRole;
use crate::ids::AgentId;
use crate::status::AgentStatus;

/// Liveness status reported in a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    #[default]
    Idle,
    Working,
    Blocked,
    Complete,
}

/// Liveness record for one agent, upserted by agent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_id: AgentId,
    pub role: AgentRole,
    pub status: HeartbeatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl Heartbeat {
    /// Creates a heartbeat stamped now.
    pub fn new(agent_id: impl Into<AgentId>, role: AgentRole, status: HeartbeatStatus) -> Self {
        Self {
            agent_id: agent_id.into(),
            role,
            status,
            current_task: None,
            last_seen: Utc::now(),
        }
    }

    /// Sets the current task (builder style).
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.current_task = Some(task.into());
        self
    }

    /// Derives a heartbeat from a poll snapshot.
    ///
    /// `last_seen` is the checklist modification time. Returns `None` when
    /// nothing was read for the agent, so no liveness is claimed for it.
    pub fn from_status(status: &AgentStatus) -> Option<Self> {
        let last_seen = status.last_modified?;
        let hb_status = if status.is_complete {
            HeartbeatStatus::Complete
        } else if status.is_idle {
            HeartbeatStatus::Idle
        } else {
            HeartbeatStatus::Working
        };

        Some(Self {
            agent_id: status.agent_id.clone(),
            role: status.role,
            status: hb_status,
            current_task: status.current_task.clone(),
            last_seen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;

    #[test]
    fn test_from_empty_status_has_no_heartbeat() {
        let agent = Agent::new("qa", AgentRole::Testing, "/tmp/qa");
        assert!(Heartbeat::from_status(&AgentStatus::empty(&agent)).is_none());
    }

    #[test]
    fn test_from_working_status() {
        let agent = Agent::new("qa", AgentRole::Testing, "/tmp/qa");
        let mut status = AgentStatus::empty(&agent);
        let modified = Utc::now();
        status.total = 2;
        status.in_progress = 1;
        status.last_modified = Some(modified);
        status.current_task = Some("Write e2e suite".to_string());

        let hb = Heartbeat::from_status(&status).unwrap();
        assert_eq!(hb.status, HeartbeatStatus::Working);
        assert_eq!(hb.current_task.as_deref(), Some("Write e2e suite"));
        assert_eq!(hb.last_seen, modified);
    }

    #[test]
    fn test_builder() {
        let hb = Heartbeat::new("be", AgentRole::Backend, HeartbeatStatus::Blocked).with_task("db schema");
        assert_eq!(hb.agent_id.as_str(), "be");
        assert_eq!(hb.current_task.as_deref(), Some("db schema"));
    }
}
