//! Coordinator events.

use conductor_models::{AgentId, AgentRole, AgentStatus, PhaseId};

use crate::injector::InjectionOutcome;

/// Events emitted by the coordinator.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// An agent's checklist became fully complete. Emitted once per transition.
    AgentComplete {
        agent_id: AgentId,
        role: AgentRole,
        total: usize,
    },
    /// An agent is idle this cycle.
    AgentIdle {
        agent_id: AgentId,
        idle_secs: u64,
        /// A continuation was already requested for this idle episode.
        already_nudged: bool,
    },
    /// A continuation request was attempted for an idle agent.
    ContinuationSent {
        agent_id: AgentId,
        outcome: InjectionOutcome,
    },
    /// Every task in the phase is complete. Emitted once per episode.
    PhaseComplete {
        phase_id: PhaseId,
        total_tasks: usize,
        /// Whether the reviewer notification was delivered.
        notified: bool,
    },
    /// A poll cycle finished.
    PollCompleted { statuses: Vec<AgentStatus> },
    /// The coordination store could not be read or written.
    StoreUnavailable { error: String },
}

impl CoordinatorEvent {
    /// Stable event name, e.g. `agent:idle`.
    pub fn name(&self) -> &'static str {
        match self {
            CoordinatorEvent::AgentComplete { .. } => "agent:complete",
            CoordinatorEvent::AgentIdle { .. } => "agent:idle",
            CoordinatorEvent::ContinuationSent { .. } => "agent:continuation",
            CoordinatorEvent::PhaseComplete { .. } => "phase:complete",
            CoordinatorEvent::PollCompleted { .. } => "poll:completed",
            CoordinatorEvent::StoreUnavailable { .. } => "store:unavailable",
        }
    }

    /// Returns the agent ID associated with this event, if any.
    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            CoordinatorEvent::AgentComplete { agent_id, .. }
            | CoordinatorEvent::AgentIdle { agent_id, .. }
            | CoordinatorEvent::ContinuationSent { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }

    /// Returns true if this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, CoordinatorEvent::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = CoordinatorEvent::AgentIdle {
            agent_id: AgentId::from("fe"),
            idle_secs: 90,
            already_nudged: false,
        };
        assert_eq!(event.name(), "agent:idle");
        assert_eq!(event.agent_id().map(|a| a.as_str()), Some("fe"));

        let event = CoordinatorEvent::PhaseComplete {
            phase_id: PhaseId::from("p2"),
            total_tasks: 3,
            notified: true,
        };
        assert_eq!(event.name(), "phase:complete");
        assert!(event.agent_id().is_none());
    }

    #[test]
    fn test_event_is_error() {
        let event = CoordinatorEvent::StoreUnavailable {
            error: "disk full".to_string(),
        };
        assert!(event.is_error());

        let event = CoordinatorEvent::PollCompleted { statuses: vec![] };
        assert!(!event.is_error());
    }
}
