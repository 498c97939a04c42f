//! Phase completion aggregator.
//!
//! Reads the current phase from the coordination store and hands it to the
//! reviewer exactly once per completion episode. The episode boundary is a
//! stored boolean ([`CompletionLatch`]), not a comparison against the
//! previous document, so restarts and repeated checks never double-notify.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use conductor_models::{CoordinationDocument, PhaseId, PhaseState, PhaseStatus, TaskStatus};
use conductor_persistence::{CoordinationStore, PersistenceError, COORDINATION_BLOCK};

use crate::error::{Result, RuntimeError};
use crate::injector::{ContinuationInjector, InjectionOutcome};
use crate::registry::AgentRegistry;

/// Edge detector for "phase became complete".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionLatch {
    phase_id: Option<PhaseId>,
    last_known_complete: bool,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation. Returns true only on the false to true edge.
    ///
    /// A different phase id starts a fresh episode.
    pub fn observe(&mut self, phase_id: &PhaseId, is_complete: bool) -> bool {
        if self.phase_id.as_ref() != Some(phase_id) {
            self.phase_id = Some(phase_id.clone());
            self.last_known_complete = false;
        }
        let fired = is_complete && !self.last_known_complete;
        self.last_known_complete = is_complete;
        fired
    }

    /// Adopts a state without firing.
    pub fn prime(&mut self, phase_id: &PhaseId, is_complete: bool) {
        self.phase_id = Some(phase_id.clone());
        self.last_known_complete = is_complete;
    }

    /// Forgets the current episode so the next complete observation fires.
    pub fn reset(&mut self) {
        self.last_known_complete = false;
    }

    /// The phase this latch is tracking.
    pub fn phase_id(&self) -> Option<&PhaseId> {
        self.phase_id.as_ref()
    }

    pub fn is_seen(&self, phase_id: &PhaseId) -> bool {
        self.phase_id.as_ref() == Some(phase_id)
    }

    pub fn last_known_complete(&self) -> bool {
        self.last_known_complete
    }
}

/// Result of one phase check.
#[derive(Debug, Clone)]
pub struct PhaseCheck {
    pub phase_id: PhaseId,
    pub total: usize,
    pub completed: usize,
    pub is_complete: bool,
    /// The completion edge fired this check.
    pub fired: bool,
    /// Reviewer notification body, when one was built.
    pub notification: Option<String>,
    /// Delivery attempts to the reviewer, when one was notified.
    pub delivery: Option<InjectionOutcome>,
}

impl PhaseCheck {
    fn observed(phase: &PhaseState) -> Self {
        Self {
            phase_id: phase.id.clone(),
            total: phase.total(),
            completed: phase.completed(),
            is_complete: phase.is_complete(),
            fired: false,
            notification: None,
            delivery: None,
        }
    }

    /// Whether the reviewer received the notification.
    pub fn notified(&self) -> bool {
        self.delivery.as_ref().is_some_and(|d| d.success())
    }
}

/// Decides phase completion and notifies the reviewer.
#[derive(Debug, Default)]
pub struct PhaseAggregator {
    latch: CompletionLatch,
}

impl PhaseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latch(&self) -> &CompletionLatch {
        &self.latch
    }

    /// Runs one completion check.
    ///
    /// Returns `None` when no phase has been initialized or it has no tasks.
    pub async fn check(
        &mut self,
        store: &dyn CoordinationStore,
        registry: &AgentRegistry,
        injector: &ContinuationInjector,
    ) -> Result<Option<PhaseCheck>> {
        let Some(doc) = store.read()? else {
            debug!("no coordination document yet");
            return Ok(None);
        };
        let phase = doc.phase;
        if phase.total() == 0 {
            return Ok(None);
        }

        let mut check = PhaseCheck::observed(&phase);

        // A phase already handed off before we first saw it was notified by
        // an earlier run.
        if !self.latch.is_seen(&phase.id)
            && check.is_complete
            && matches!(phase.status, PhaseStatus::Review | PhaseStatus::Complete)
        {
            debug!(phase_id = %phase.id, status = %phase.status, "phase already handed off");
            self.latch.prime(&phase.id, true);
            return Ok(Some(check));
        }

        check.fired = self.latch.observe(&phase.id, check.is_complete);

        if !check.is_complete {
            self.advance_incomplete(store, &phase)?;
            return Ok(Some(check));
        }

        if !check.fired {
            return Ok(Some(check));
        }

        info!(
            phase_id = %phase.id,
            total = check.total,
            "phase complete, requesting review"
        );

        let phase = match store.set_phase_status(PhaseStatus::Review) {
            Ok(phase) => phase,
            Err(e) => {
                // Let the next check retry the hand-off.
                self.latch.reset();
                return Err(e.into());
            }
        };

        let notification = build_notification(&phase);
        check.delivery = self.notify_reviewer(registry, injector, &notification).await;
        check.notification = Some(notification);
        Ok(Some(check))
    }

    /// Re-sends the current phase to the reviewer, bypassing the latch.
    ///
    /// # Errors
    /// `NoReviewer` if no agent holds the reviewer role; `Store` if there
    /// is no coordination document or it cannot be read.
    pub async fn trigger_review(
        &self,
        store: &dyn CoordinationStore,
        registry: &AgentRegistry,
        injector: &ContinuationInjector,
    ) -> Result<PhaseCheck> {
        let reviewer = registry.reviewer().ok_or(RuntimeError::NoReviewer)?;
        let doc: CoordinationDocument = store.read()?.ok_or_else(|| PersistenceError::NotFound {
            kind: "coordination document".to_string(),
            id: COORDINATION_BLOCK.to_string(),
        })?;

        let notification = build_notification(&doc.phase);
        info!(phase_id = %doc.phase.id, reviewer = %reviewer.id, "manual review requested");
        let outcome = injector.inject(reviewer, notification.clone(), None).await;

        let mut check = PhaseCheck::observed(&doc.phase);
        check.notification = Some(notification);
        check.delivery = Some(outcome);
        Ok(check)
    }

    fn advance_incomplete(&self, store: &dyn CoordinationStore, phase: &PhaseState) -> Result<()> {
        let next = match phase.status {
            PhaseStatus::Review => Some(PhaseStatus::InProgress),
            PhaseStatus::Planning
                if phase.tasks.iter().any(|t| t.status != TaskStatus::Pending) =>
            {
                Some(PhaseStatus::InProgress)
            }
            _ => None,
        };
        if let Some(status) = next {
            debug!(phase_id = %phase.id, from = %phase.status, to = %status, "phase status advanced");
            store.set_phase_status(status)?;
        }
        Ok(())
    }

    async fn notify_reviewer(
        &self,
        registry: &AgentRegistry,
        injector: &ContinuationInjector,
        notification: &str,
    ) -> Option<InjectionOutcome> {
        let Some(reviewer) = registry.reviewer() else {
            warn!("phase complete but no reviewer agent is registered");
            return None;
        };
        let outcome = injector.inject(reviewer, notification, None).await;
        if !outcome.success() {
            // The phase stays in review; an operator can re-send with trigger_review.
            warn!(reviewer = %reviewer.id, reason = %outcome.summary(), "reviewer notification failed");
        }
        Some(outcome)
    }
}

/// Renders the reviewer hand-off: every task plus the expected response shape.
pub fn build_notification(phase: &PhaseState) -> String {
    let mut out = format!(
        "# Phase {} ready for review\n\n{}/{} tasks complete as of {}.\n\n",
        phase.id,
        phase.completed(),
        phase.total(),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    );

    out.push_str("| Task | Assignee | Description | Status |\n");
    out.push_str("|------|----------|-------------|--------|\n");
    for task in &phase.tasks {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            task.id,
            task.assignee,
            task.description.replace('|', "\\|"),
            task.status
        ));
    }

    let response = json!({
        "phase_id": phase.id.as_str(),
        "decision": "approved | changes_requested",
        "tasks": phase.tasks.iter().map(|t| json!({
            "id": t.id.as_str(),
            "decision": "approved | changes_requested",
            "notes": "",
        })).collect::<Vec<_>>(),
        "notes": "",
    });
    let response = serde_json::to_string_pretty(&response).unwrap_or_default();

    out.push_str("\nRespond with:\n\n```json\n");
    out.push_str(&response);
    out.push_str("\n```\n");
    out
}
