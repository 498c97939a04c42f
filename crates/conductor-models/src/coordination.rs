//! The coordinator-owned record stored in the shared coordination document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::heartbeat::Heartbeat;
use crate::ids::PhaseId;
use crate::phase::PhaseState;

/// Id given to the placeholder phase of a freshly created document.
pub const UNASSIGNED_PHASE: &str = "unassigned";

/// Current phase state plus agent heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationDocument {
    /// Incremented on every write. Diagnostic only.
    #[serde(default)]
    pub revision: u64,
    pub phase: PhaseState,
    #[serde(default)]
    pub heartbeats: Vec<Heartbeat>,
}

impl Default for CoordinationDocument {
    fn default() -> Self {
        Self::new(PhaseState::new(PhaseId::from(UNASSIGNED_PHASE)))
    }
}

impl CoordinationDocument {
    /// Creates a document around a phase with no heartbeats.
    pub fn new(phase: PhaseState) -> Self {
        Self {
            revision: 0,
            phase,
            heartbeats: Vec::new(),
        }
    }

    /// Replaces the heartbeat for the same agent, or appends it.
    pub fn upsert_heartbeat(&mut self, heartbeat: Heartbeat) {
        match self
            .heartbeats
            .iter_mut()
            .find(|h| h.agent_id == heartbeat.agent_id)
        {
            Some(existing) => *existing = heartbeat,
            None => self.heartbeats.push(heartbeat),
        }
    }

    /// Most recent heartbeat timestamp across agents.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.heartbeats.iter().map(|h| h.last_seen).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRole;
    use crate::heartbeat::HeartbeatStatus;

    #[test]
    fn test_default_document() {
        let doc = CoordinationDocument::default();
        assert_eq!(doc.phase.id.as_str(), UNASSIGNED_PHASE);
        assert!(doc.heartbeats.is_empty());
        assert_eq!(doc.revision, 0);
    }

    #[test]
    fn test_upsert_heartbeat_by_agent() {
        let mut doc = CoordinationDocument::default();
        doc.upsert_heartbeat(Heartbeat::new("fe", AgentRole::Frontend, HeartbeatStatus::Working));
        doc.upsert_heartbeat(Heartbeat::new("be", AgentRole::Backend, HeartbeatStatus::Idle));
        doc.upsert_heartbeat(Heartbeat::new("fe", AgentRole::Frontend, HeartbeatStatus::Complete));

        assert_eq!(doc.heartbeats.len(), 2);
        assert_eq!(doc.heartbeats[0].status, HeartbeatStatus::Complete);
        assert!(doc.last_heartbeat().is_some());
    }
}
