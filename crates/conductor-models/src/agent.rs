//! Registered agent types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ids::AgentId;

/// Role an agent plays within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Initializes phases and dispatches tasks.
    Coordinator,
    /// Receives the phase hand-off once every task is complete.
    Reviewer,
    /// Worker: user-facing code.
    Frontend,
    /// Worker: services and storage.
    Backend,
    /// Worker: wiring components together.
    Integration,
    /// Worker: test suites and verification.
    Testing,
    /// Worker: documentation.
    Docs,
}

impl AgentRole {
    /// All roles, in display order.
    pub const ALL: [AgentRole; 7] = [
        AgentRole::Coordinator,
        AgentRole::Reviewer,
        AgentRole::Frontend,
        AgentRole::Backend,
        AgentRole::Integration,
        AgentRole::Testing,
        AgentRole::Docs,
    ];

    /// Returns the snake_case name used in configuration and documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => "coordinator",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Frontend => "frontend",
            AgentRole::Backend => "backend",
            AgentRole::Integration => "integration",
            AgentRole::Testing => "testing",
            AgentRole::Docs => "docs",
        }
    }

    /// Returns true for the worker kinds (anything but coordinator and reviewer).
    pub fn is_worker(&self) -> bool {
        !matches!(self, AgentRole::Coordinator | AgentRole::Reviewer)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        AgentRole::ALL
            .into_iter()
            .find(|role| role.as_str() == needle)
            .ok_or_else(|| format!("unknown agent role: {}", s))
    }
}

/// A registered participant whose only observable state is its state directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier.
    pub id: AgentId,
    /// Role within the phase.
    pub role: AgentRole,
    /// Private state ("brain") directory owned by the agent.
    pub state_dir: PathBuf,
}

impl Agent {
    /// Creates a new agent record.
    pub fn new(id: impl Into<AgentId>, role: AgentRole, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            role,
            state_dir: state_dir.into(),
        }
    }

    /// Returns the path of a file inside the agent's state directory.
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.state_dir.join(name)
    }
}
