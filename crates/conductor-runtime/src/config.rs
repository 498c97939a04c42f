//! Runtime configuration.

use std::time::Duration;

use conductor_core::config::DEFAULT_CHECKLIST_FILE;
use conductor_core::Settings;

/// Configuration for the coordinator runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often to poll agent checklists.
    pub poll_interval: Duration,
    /// How long an incomplete checklist may go unmodified before the agent is idle.
    pub idle_threshold: Duration,
    /// How often to evaluate phase completion.
    pub phase_check_interval: Duration,
    /// Whether the phase-check loop runs at all.
    pub phase_check_enabled: bool,
    /// Send continuation requests to idle agents.
    pub auto_continue: bool,
    /// Upsert heartbeats after each poll.
    pub record_heartbeats: bool,
    /// Checklist file name inside each state directory.
    pub checklist_file: String,
    /// Command for the process delivery strategy.
    pub injector_command: Option<String>,
    /// Hard timeout for the process delivery strategy.
    pub injector_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            idle_threshold: Duration::from_secs(60),
            phase_check_interval: Duration::from_secs(15),
            phase_check_enabled: true,
            auto_continue: true,
            record_heartbeats: true,
            checklist_file: DEFAULT_CHECKLIST_FILE.to_string(),
            injector_command: None,
            injector_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Settings> for RuntimeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            idle_threshold: settings.idle_threshold(),
            phase_check_interval: settings.phase_check_interval(),
            phase_check_enabled: settings.phase.enabled,
            auto_continue: settings.poller.auto_continue,
            record_heartbeats: settings.poller.record_heartbeats,
            checklist_file: settings.artifacts.checklist_file.clone(),
            injector_command: settings.injector.command.clone(),
            injector_timeout: settings.injector_timeout(),
        }
    }
}

impl RuntimeConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the idle threshold.
    pub fn with_idle_threshold(mut self, threshold: Duration) -> Self {
        self.idle_threshold = threshold;
        self
    }

    /// Sets the phase-check interval.
    pub fn with_phase_check_interval(mut self, interval: Duration) -> Self {
        self.phase_check_interval = interval;
        self
    }

    /// Enables or disables the phase-check loop.
    pub fn with_phase_check(mut self, enabled: bool) -> Self {
        self.phase_check_enabled = enabled;
        self
    }

    /// Enables or disables automatic continuation.
    pub fn with_auto_continue(mut self, enabled: bool) -> Self {
        self.auto_continue = enabled;
        self
    }

    /// Enables or disables heartbeat recording.
    pub fn with_heartbeats(mut self, enabled: bool) -> Self {
        self.record_heartbeats = enabled;
        self
    }

    /// Sets the checklist file name.
    pub fn with_checklist_file(mut self, name: impl Into<String>) -> Self {
        self.checklist_file = name.into();
        self
    }

    /// Sets the process-strategy command.
    pub fn with_injector_command(mut self, command: impl Into<String>) -> Self {
        self.injector_command = Some(command.into());
        self
    }

    /// Sets the process-strategy timeout.
    pub fn with_injector_timeout(mut self, timeout: Duration) -> Self {
        self.injector_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.idle_threshold, Duration::from_secs(60));
        assert!(config.auto_continue);
        assert_eq!(config.checklist_file, "task.md");
        assert!(config.injector_command.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = RuntimeConfig::new()
            .with_poll_interval(Duration::from_millis(100))
            .with_idle_threshold(Duration::from_secs(5))
            .with_auto_continue(false)
            .with_injector_command("agent-cli")
            .with_injector_timeout(Duration::from_secs(2));

        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.idle_threshold, Duration::from_secs(5));
        assert!(!config.auto_continue);
        assert_eq!(config.injector_command.as_deref(), Some("agent-cli"));
        assert_eq!(config.injector_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::from_toml_str(
            "[poller]\ninterval_secs = 3\nauto_continue = false\n[phase]\nenabled = false\n",
        )
        .unwrap();
        let config = RuntimeConfig::from(&settings);

        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert!(!config.auto_continue);
        assert!(!config.phase_check_enabled);
    }
}
