//! Coordinator settings file.
//!
//! ```toml
//! coordination_document = "~/project/COORDINATION.md"
//!
//! [poller]
//! interval_secs = 10
//! idle_threshold_secs = 60
//! auto_continue = true
//!
//! [injector]
//! command = "agent-cli"
//! timeout_secs = 5
//!
//! [[agents]]
//! id = "frontend-1"
//! role = "frontend"
//! state_dir = "~/.gemini/antigravity/brain/3f2a"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use conductor_models::{Agent, AgentRole};

use crate::config;
use crate::error::{ConfigError, Result};

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub interval_secs: u64,
    /// An incomplete agent whose checklist is older than this is idle.
    pub idle_threshold_secs: u64,
    /// Send continuation requests to idle agents.
    pub auto_continue: bool,
    /// Upsert a heartbeat per agent after each poll.
    pub record_heartbeats: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            idle_threshold_secs: 60,
            auto_continue: true,
            record_heartbeats: true,
        }
    }
}

/// Phase-check loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PhaseSettings {
    pub enabled: bool,
    pub check_interval_secs: u64,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 15,
        }
    }
}

/// Continuation injector settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InjectorSettings {
    /// Command invoked as `<command> <agent-id> <prompt>`. Unset disables
    /// the process strategy.
    pub command: Option<String>,
    pub timeout_secs: u64,
}

impl Default for InjectorSettings {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 5,
        }
    }
}

/// File names looked up inside agent state directories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub checklist_file: String,
    pub narrative_file: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            checklist_file: config::DEFAULT_CHECKLIST_FILE.to_string(),
            narrative_file: config::DEFAULT_NARRATIVE_FILE.to_string(),
        }
    }
}

/// One `[[agents]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentSettings {
    pub id: String,
    pub role: AgentRole,
    pub state_dir: PathBuf,
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub coordination_document: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub poller: PollerSettings,
    pub phase: PhaseSettings,
    pub injector: InjectorSettings,
    pub artifacts: ArtifactSettings,
    pub agents: Vec<AgentSettings>,
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl Settings {
    /// Load and validate settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), agents = settings.agents.len(), "settings loaded");
        Ok(settings)
    }

    /// Load settings if the file exists.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text).map_err(|source| ConfigError::ParseError {
            path: PathBuf::new(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check intervals and agent entries.
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(invalid("poller.interval_secs", "must be greater than zero"));
        }
        if self.phase.check_interval_secs == 0 {
            return Err(invalid("phase.check_interval_secs", "must be greater than zero"));
        }
        if self.injector.timeout_secs == 0 {
            return Err(invalid("injector.timeout_secs", "must be greater than zero"));
        }
        if self.artifacts.checklist_file.trim().is_empty() {
            return Err(invalid("artifacts.checklist_file", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(invalid("agents.id", "must not be empty"));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(invalid("agents.id", format!("duplicate agent id '{}'", agent.id)));
            }
        }
        Ok(())
    }

    /// Registered agents in declaration order, with `~` expanded.
    pub fn agents(&self) -> Vec<Agent> {
        self.agents
            .iter()
            .map(|a| Agent::new(a.id.as_str(), a.role, expand(&a.state_dir)))
            .collect()
    }

    /// Coordination document path, falling back to the state directory.
    pub fn coordination_document(&self) -> PathBuf {
        self.coordination_document
            .as_deref()
            .map(expand)
            .unwrap_or_else(config::coordination_file)
    }

    /// Report output directory, falling back to the state directory.
    pub fn reports_dir(&self) -> PathBuf {
        self.reports_dir
            .as_deref()
            .map(expand)
            .unwrap_or_else(config::reports_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.poller.idle_threshold_secs)
    }

    pub fn phase_check_interval(&self) -> Duration {
        Duration::from_secs(self.phase.check_interval_secs)
    }

    pub fn injector_timeout(&self) -> Duration {
        Duration::from_secs(self.injector.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
coordination_document = "/srv/project/COORDINATION.md"

[poller]
interval_secs = 5
idle_threshold_secs = 90

[injector]
command = "agent-cli"

[[agents]]
id = "fe"
role = "frontend"
state_dir = "/brains/fe"

[[agents]]
id = "rev"
role = "reviewer"
state_dir = "/brains/rev"
"#;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.poller, PollerSettings::default());
        assert_eq!(settings.artifacts.checklist_file, "task.md");
        assert_eq!(settings.injector_timeout(), Duration::from_secs(5));
        assert!(settings.agents.is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.idle_threshold(), Duration::from_secs(90));
        assert!(settings.poller.auto_continue);
        assert_eq!(settings.injector.command.as_deref(), Some("agent-cli"));
        assert_eq!(
            settings.coordination_document(),
            PathBuf::from("/srv/project/COORDINATION.md")
        );

        let agents = settings.agents();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id.as_str(), "fe");
        assert_eq!(agents[1].role, AgentRole::Reviewer);
        assert_eq!(agents[1].state_dir, PathBuf::from("/brains/rev"));
    }

    #[test]
    fn test_tilde_expansion() {
        let settings = Settings::from_toml_str(
            "[[agents]]\nid = \"a\"\nrole = \"docs\"\nstate_dir = \"~/brain/a\"\n",
        )
        .unwrap();
        let agent = &settings.agents()[0];
        assert!(!agent.state_dir.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }

    #[test]
    fn test_duplicate_agent_ids_rejected() {
        let text = "[[agents]]\nid = \"a\"\nrole = \"docs\"\nstate_dir = \"/x\"\n\
                    [[agents]]\nid = \"a\"\nrole = \"backend\"\nstate_dir = \"/y\"\n";
        let err = Settings::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "agents.id"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Settings::from_toml_str("[poller]\ninterval_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("poller.interval_secs"));
    }

    #[test]
    fn test_unknown_role_is_parse_error() {
        let text = "[[agents]]\nid = \"a\"\nrole = \"manager\"\nstate_dir = \"/x\"\n";
        assert!(matches!(
            Settings::from_toml_str(text),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Settings::load_optional(&path).unwrap().is_none());
        assert!(matches!(Settings::load(&path), Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conductor.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.agents.len(), 2);
    }
}
