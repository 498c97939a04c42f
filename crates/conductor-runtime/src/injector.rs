//! Continuation injector: nudges idle agents back into activity.
//!
//! Agents are opaque external processes, so there is no channel that is
//! guaranteed to reach them. The injector tries delivery strategies in a
//! fixed priority order and stops at the first success:
//!
//! 1. [`FileDropStrategy`] writes `continuation_request.json` into the
//!    agent's state directory. Requires nothing from the agent beyond
//!    watching its own directory.
//! 2. [`ProcessStrategy`] invokes a configured command line entry point
//!    under a hard timeout. Experimental.
//! 3. [`RealtimeStrategy`] is reserved and always reports not-implemented.
//!
//! A failing strategy is never an error; it just falls through to the next.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use conductor_core::config::CONTINUATION_FILE;
use conductor_models::{Agent, AgentId, AgentStatus, ContinuationContext, ContinuationRequest};
use conductor_persistence::atomic::{atomic_write_json, read_json_optional, remove_if_exists};
use conductor_persistence::Result as PersistenceResult;

use crate::config::RuntimeConfig;

/// Which delivery strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    FileDrop,
    Process,
    Realtime,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StrategyKind::FileDrop => "file_drop",
            StrategyKind::Process => "process",
            StrategyKind::Realtime => "realtime",
        })
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionResult {
    pub strategy: StrategyKind,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl InjectionResult {
    pub fn ok(strategy: StrategyKind, message: impl Into<String>) -> Self {
        Self {
            strategy,
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(strategy: StrategyKind, message: impl Into<String>) -> Self {
        Self {
            strategy,
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// All attempts made for one injection, in order.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionOutcome {
    pub agent_id: AgentId,
    pub attempts: Vec<InjectionResult>,
}

impl InjectionOutcome {
    /// True if any strategy delivered the request.
    pub fn success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// The strategy that delivered the request.
    pub fn delivered_by(&self) -> Option<StrategyKind> {
        self.attempts.iter().find(|a| a.success).map(|a| a.strategy)
    }

    /// The last attempt's message, for logs.
    pub fn summary(&self) -> &str {
        self.attempts
            .last()
            .map(|a| a.message.as_str())
            .unwrap_or("no strategies configured")
    }
}

/// A way of placing a continuation request where an agent will notice it.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    /// Returns which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Attempts delivery. Failures are reported in the result, never raised.
    async fn deliver(&self, agent: &Agent, request: &ContinuationRequest) -> InjectionResult;
}

/// Path of the file-drop request inside an agent's state directory.
pub fn request_path(agent: &Agent) -> PathBuf {
    agent.file(CONTINUATION_FILE)
}

/// Writes the request as JSON into the agent's state directory.
#[derive(Debug, Default)]
pub struct FileDropStrategy;

#[async_trait]
impl DeliveryStrategy for FileDropStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FileDrop
    }

    async fn deliver(&self, agent: &Agent, request: &ContinuationRequest) -> InjectionResult {
        if !agent.state_dir.is_dir() {
            return InjectionResult::failed(
                self.kind(),
                format!("state directory missing: {}", agent.state_dir.display()),
            );
        }

        let path = request_path(agent);
        match atomic_write_json(&path, request) {
            Ok(()) => InjectionResult::ok(self.kind(), format!("wrote {}", path.display())),
            Err(e) => InjectionResult::failed(self.kind(), e.to_string()),
        }
    }
}

/// Invokes `<command> <agent-id> <prompt>` with a hard timeout.
#[derive(Debug, Clone)]
pub struct ProcessStrategy {
    command: String,
    timeout: Duration,
}

impl ProcessStrategy {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for ProcessStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Process
    }

    async fn deliver(&self, agent: &Agent, request: &ContinuationRequest) -> InjectionResult {
        let program = match which::which(&self.command) {
            Ok(path) => path,
            Err(e) => {
                return InjectionResult::failed(
                    self.kind(),
                    format!("command '{}' not found: {}", self.command, e),
                )
            }
        };

        debug!(program = %program.display(), agent_id = %agent.id, "invoking continuation command");

        let mut command = Command::new(&program);
        command
            .arg(agent.id.as_str())
            .arg(&request.prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the child.
        match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => InjectionResult::failed(
                self.kind(),
                format!("timed out after {}ms", self.timeout.as_millis()),
            ),
            Ok(Err(e)) => InjectionResult::failed(self.kind(), format!("spawn failed: {}", e)),
            Ok(Ok(output)) if output.status.success() => {
                InjectionResult::ok(self.kind(), format!("{} exited successfully", self.command))
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                InjectionResult::failed(
                    self.kind(),
                    format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
                )
            }
        }
    }
}

/// Placeholder for a future real-time channel.
#[derive(Debug, Default)]
pub struct RealtimeStrategy;

#[async_trait]
impl DeliveryStrategy for RealtimeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Realtime
    }

    async fn deliver(&self, _agent: &Agent, _request: &ContinuationRequest) -> InjectionResult {
        InjectionResult::failed(self.kind(), "real-time delivery not implemented")
    }
}

/// Tries delivery strategies in priority order.
pub struct ContinuationInjector {
    strategies: Vec<Box<dyn DeliveryStrategy>>,
}

impl std::fmt::Debug for ContinuationInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.strategies.iter().map(|s| s.kind()).collect();
        f.debug_struct("ContinuationInjector")
            .field("strategies", &kinds)
            .finish()
    }
}

impl ContinuationInjector {
    /// File drop first, then the process strategy if a command is
    /// configured, then the reserved real-time slot.
    pub fn new(config: &RuntimeConfig) -> Self {
        let mut strategies: Vec<Box<dyn DeliveryStrategy>> = vec![Box::new(FileDropStrategy)];
        if let Some(command) = &config.injector_command {
            strategies.push(Box::new(ProcessStrategy::new(
                command.clone(),
                config.injector_timeout,
            )));
        }
        strategies.push(Box::new(RealtimeStrategy));
        Self { strategies }
    }

    /// Uses an explicit strategy list, tried in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn DeliveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// Configured strategy kinds, in priority order.
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Sends a continuation request, stopping at the first strategy that succeeds.
    pub async fn inject(
        &self,
        agent: &Agent,
        prompt: impl Into<String>,
        context: Option<ContinuationContext>,
    ) -> InjectionOutcome {
        let request = ContinuationRequest::new(agent, prompt, context);
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let result = strategy.deliver(agent, &request).await;
            let success = result.success;
            if success {
                info!(
                    agent_id = %agent.id,
                    strategy = %result.strategy,
                    request_id = %request.id,
                    "continuation delivered"
                );
            } else {
                debug!(
                    agent_id = %agent.id,
                    strategy = %result.strategy,
                    message = %result.message,
                    "delivery strategy failed"
                );
            }
            attempts.push(result);
            if success {
                break;
            }
        }

        let outcome = InjectionOutcome {
            agent_id: agent.id.clone(),
            attempts,
        };
        if !outcome.success() {
            warn!(agent_id = %agent.id, reason = %outcome.summary(), "all delivery strategies failed");
        }
        outcome
    }

    /// Reads and deletes the pending file-drop request for an agent.
    pub fn consume(agent: &Agent) -> PersistenceResult<Option<ContinuationRequest>> {
        let path = request_path(agent);
        let request: Option<ContinuationRequest> = read_json_optional(&path)?;
        if request.is_some() {
            remove_if_exists(&path)?;
        }
        Ok(request)
    }

    /// True while a file-drop request is waiting to be consumed.
    pub fn pending(agent: &Agent) -> bool {
        request_path(agent).is_file()
    }
}

/// Default continuation prompt for an idle agent.
pub fn continuation_prompt(status: &AgentStatus) -> String {
    let mut prompt = format!(
        "You have been idle for {}s with {}/{} checklist items complete.",
        status.idle_secs.unwrap_or(0),
        status.completed,
        status.total
    );
    match &status.current_task {
        Some(task) => prompt.push_str(&format!(" Continue with: {}.", task)),
        None if status.pending > 0 => prompt.push_str(" Pick up the next pending item."),
        None => {}
    }
    prompt.push_str(" Update your checklist as you make progress.");
    prompt
}
