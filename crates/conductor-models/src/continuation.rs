//! Continuation requests placed in an agent's state directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRole};
use crate::ids::{AgentId, RequestId};
use crate::status::AgentStatus;

/// Structured context attached to a continuation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tasks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_tasks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_secs: Option<u64>,
}

impl ContinuationContext {
    /// Builds context from a poll snapshot.
    pub fn from_status(status: &AgentStatus) -> Self {
        Self {
            current_task: status.current_task.clone(),
            total_tasks: Some(status.total),
            completed_tasks: Some(status.completed),
            idle_secs: status.idle_secs,
        }
    }
}

/// A message asking an agent to resume work. Written once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationRequest {
    pub id: RequestId,
    pub agent_id: AgentId,
    pub role: AgentRole,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContinuationContext>,
    pub created_at: DateTime<Utc>,
}

impl ContinuationRequest {
    /// Creates a request for an agent, stamped now.
    pub fn new(agent: &Agent, prompt: impl Into<String>, context: Option<ContinuationContext>) -> Self {
        Self {
            id: RequestId::new(),
            agent_id: agent.id.clone(),
            role: agent.role,
            prompt: prompt.into(),
            context,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_status() {
        let agent = Agent::new("fe", AgentRole::Frontend, "/tmp/fe");
        let mut status = AgentStatus::empty(&agent);
        status.total = 4;
        status.completed = 1;
        status.idle_secs = Some(120);
        status.current_task = Some("Nav bar".to_string());

        let ctx = ContinuationContext::from_status(&status);
        assert_eq!(ctx.total_tasks, Some(4));
        assert_eq!(ctx.completed_tasks, Some(1));
        assert_eq!(ctx.idle_secs, Some(120));
        assert_eq!(ctx.current_task.as_deref(), Some("Nav bar"));
    }

    #[test]
    fn test_request_json_omits_empty_context() {
        let agent = Agent::new("fe", AgentRole::Frontend, "/tmp/fe");
        let request = ContinuationRequest::new(&agent, "keep going", None);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["agent_id"], "fe");
        assert_eq!(json["role"], "frontend");
        assert_eq!(json["prompt"], "keep going");
        assert!(json.get("context").is_none());
    }
}
