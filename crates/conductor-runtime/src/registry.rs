//! Registered agents, in registration order.

use tracing::info;

use conductor_models::{Agent, AgentId, AgentRole};

use crate::error::{Result, RuntimeError};

/// The set of agents the coordinator watches.
///
/// Order matters only for log ordering: agents are polled in the order they
/// were registered.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from static configuration.
    ///
    /// # Errors
    /// Returns `AgentExists` on a duplicate id.
    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Result<Self> {
        let mut registry = Self::new();
        for agent in agents {
            registry.register(agent)?;
        }
        Ok(registry)
    }

    /// Registers an agent.
    pub fn register(&mut self, agent: Agent) -> Result<()> {
        if self.get(&agent.id).is_some() {
            return Err(RuntimeError::AgentExists(agent.id.to_string()));
        }
        info!(agent_id = %agent.id, role = %agent.role, "agent registered");
        self.agents.push(agent);
        Ok(())
    }

    /// Removes an agent, returning it if it was registered.
    pub fn deregister(&mut self, id: &AgentId) -> Option<Agent> {
        let index = self.agents.iter().position(|a| &a.id == id)?;
        let agent = self.agents.remove(index);
        info!(agent_id = %agent.id, "agent deregistered");
        Some(agent)
    }

    /// Looks up an agent by id.
    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == id)
    }

    /// Agents holding a role, in registration order.
    pub fn with_role(&self, role: AgentRole) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(move |a| a.role == role)
    }

    /// The first registered reviewer.
    pub fn reviewer(&self) -> Option<&Agent> {
        self.with_role(AgentRole::Reviewer).next()
    }

    /// All agents in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<Agent> {
        vec![
            Agent::new("fe", AgentRole::Frontend, "/b/fe"),
            Agent::new("rev", AgentRole::Reviewer, "/b/rev"),
            Agent::new("be", AgentRole::Backend, "/b/be"),
        ]
    }

    #[test]
    fn test_registration_order() {
        let registry = AgentRegistry::from_agents(agents()).unwrap();
        let ids: Vec<_> = registry.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["fe", "rev", "be"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = AgentRegistry::from_agents(agents()).unwrap();
        let result = registry.register(Agent::new("fe", AgentRole::Docs, "/b/other"));
        assert!(matches!(result, Err(RuntimeError::AgentExists(_))));
    }

    #[test]
    fn test_deregister() {
        let mut registry = AgentRegistry::from_agents(agents()).unwrap();
        let removed = registry.deregister(&AgentId::from("rev")).unwrap();
        assert_eq!(removed.role, AgentRole::Reviewer);
        assert!(registry.reviewer().is_none());
        assert!(registry.deregister(&AgentId::from("rev")).is_none());
    }

    #[test]
    fn test_reviewer_lookup() {
        let registry = AgentRegistry::from_agents(agents()).unwrap();
        assert_eq!(registry.reviewer().unwrap().id.as_str(), "rev");
        assert!(AgentRegistry::new().reviewer().is_none());
    }
}
