//! Core logic shared by the Conductor crates.
//!
//! - [`checklist`]: parses agent checklists into typed items
//! - [`narrative`]: best-effort extraction from free-form completion reports
//! - [`config`]: state directory and well-known paths
//! - [`settings`]: the coordinator settings file

pub mod checklist;
pub mod config;
pub mod error;
pub mod narrative;
pub mod settings;

pub use checklist::{parse, parse_bytes, set_status};
pub use error::{ChecklistError, ConfigError};
pub use narrative::{MediaKind, MediaRef, NarrativeSummary, TestOutcome};
pub use settings::Settings;
