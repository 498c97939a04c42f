//! Core data models for Conductor.
//!
//! This crate provides the fundamental data types shared by the coordinator:
//! registered agents, parsed checklists, derived agent status, phase task
//! dispatch records, heartbeats, the coordination document, and
//! continuation requests.

pub mod agent;
pub mod checklist;
pub mod continuation;
pub mod coordination;
pub mod heartbeat;
pub mod ids;
pub mod phase;
pub mod status;

// Re-export main types
pub use agent::{Agent, AgentRole};
pub use checklist::{Checklist, ChecklistItem, ChecklistStatus, UNTITLED_CHECKLIST};
pub use continuation::{ContinuationContext, ContinuationRequest};
pub use coordination::{CoordinationDocument, UNASSIGNED_PHASE};
pub use heartbeat::{Heartbeat, HeartbeatStatus};
pub use ids::{AgentId, PhaseId, RequestId, TaskId};
pub use phase::{PhaseState, PhaseStatus, TaskDispatch, TaskStatus};
pub use status::AgentStatus;
