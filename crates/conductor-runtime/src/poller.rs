//! Liveness and progress poller.
//!
//! Each cycle reads every registered agent's checklist, derives an
//! [`AgentStatus`], and reports edge-triggered completion plus per-cycle
//! idleness. A broken or missing checklist never aborts the cycle; that
//! agent just reports an empty status.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use conductor_core::checklist;
use conductor_models::{Agent, AgentId, AgentStatus};

use crate::config::RuntimeConfig;
use crate::event::CoordinatorEvent;
use crate::injector::ContinuationInjector;
use crate::registry::AgentRegistry;

/// Result of one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    /// One status per registered agent, in registration order.
    pub statuses: Vec<AgentStatus>,
    /// Completion and idle events raised this cycle.
    pub events: Vec<CoordinatorEvent>,
}

impl PollOutcome {
    /// Statuses of agents that are idle this cycle and not yet nudged.
    pub fn needs_nudge(&self) -> impl Iterator<Item = &AgentStatus> {
        self.statuses.iter().filter(move |s| {
            s.is_idle
                && self.events.iter().any(|e| {
                    matches!(e, CoordinatorEvent::AgentIdle { agent_id, already_nudged: false, .. }
                        if agent_id == &s.agent_id)
                })
        })
    }
}

#[derive(Debug, Default)]
struct AgentTrack {
    was_complete: bool,
    /// Checklist mtime of the idle episode that was nudged.
    nudged_episode: Option<DateTime<Utc>>,
}

/// Polls agent checklists and tracks per-agent edges between cycles.
#[derive(Debug)]
pub struct ProgressPoller {
    idle_threshold: Duration,
    checklist_file: String,
    tracks: HashMap<AgentId, AgentTrack>,
}

impl ProgressPoller {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            idle_threshold: config.idle_threshold,
            checklist_file: config.checklist_file.clone(),
            tracks: HashMap::new(),
        }
    }

    /// Polls every registered agent in registration order.
    pub fn poll_all(&mut self, registry: &AgentRegistry, now: DateTime<Utc>) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        // Forget agents that were deregistered.
        self.tracks.retain(|id, _| registry.get(id).is_some());

        for agent in registry.iter() {
            let Some(status) = self.poll_agent(agent, now) else {
                outcome.statuses.push(AgentStatus::empty(agent));
                continue;
            };

            let track = self.tracks.entry(agent.id.clone()).or_default();

            if status.is_complete && !track.was_complete {
                debug!(agent_id = %agent.id, total = status.total, "agent checklist complete");
                outcome.events.push(CoordinatorEvent::AgentComplete {
                    agent_id: agent.id.clone(),
                    role: agent.role,
                    total: status.total,
                });
            }
            track.was_complete = status.is_complete;

            if status.is_idle {
                let already_nudged = (track.nudged_episode.is_some()
                    && track.nudged_episode == status.last_modified)
                    || ContinuationInjector::pending(agent);
                outcome.events.push(CoordinatorEvent::AgentIdle {
                    agent_id: agent.id.clone(),
                    idle_secs: status.idle_secs.unwrap_or(0),
                    already_nudged,
                });
            }

            outcome.statuses.push(status);
        }

        trace!(agents = outcome.statuses.len(), events = outcome.events.len(), "poll cycle done");
        outcome
    }

    /// Reads one agent's checklist.
    ///
    /// `Some(empty status)` when there is nothing to read yet; `None` when
    /// reading failed, which leaves the agent's edge tracking untouched.
    pub fn poll_agent(&self, agent: &Agent, now: DateTime<Utc>) -> Option<AgentStatus> {
        let path = agent.file(&self.checklist_file);
        match read_checklist(&path) {
            Ok(Some((bytes, modified))) => match checklist::parse_bytes(&bytes) {
                Ok(parsed) => Some(AgentStatus::from_checklist(
                    agent,
                    &parsed,
                    modified,
                    now,
                    self.idle_threshold,
                )),
                Err(e) => {
                    warn!(agent_id = %agent.id, path = %path.display(), error = %e, "unreadable checklist");
                    None
                }
            },
            Ok(None) => {
                trace!(agent_id = %agent.id, "no checklist yet");
                Some(AgentStatus::empty(agent))
            }
            Err(e) => {
                warn!(agent_id = %agent.id, path = %path.display(), error = %e, "failed to read checklist");
                None
            }
        }
    }

    /// Records that the current idle episode of this agent was nudged.
    pub fn mark_nudged(&mut self, status: &AgentStatus) {
        let track = self.tracks.entry(status.agent_id.clone()).or_default();
        track.nudged_episode = status.last_modified;
    }
}

fn read_checklist(path: &Path) -> std::io::Result<Option<(Vec<u8>, DateTime<Utc>)>> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let modified: DateTime<Utc> = metadata.modified()?.into();
    let bytes = std::fs::read(path)?;
    Ok(Some((bytes, modified)))
}
