//! Phase reports for Conductor.
//!
//! [`ArtifactReader`] collects what each agent left in its state directory
//! (checklist, completion narrative, media). [`aggregate`] folds those into
//! a [`PhaseReport`] that renders as one Markdown document with a summary
//! table, a completion certificate, every narrative inlined and a media
//! gallery.

pub mod artifacts;
pub mod error;
pub mod report;

pub use artifacts::{AgentArtifacts, ArtifactReader};
pub use error::{ReportError, Result};
pub use report::{
    aggregate, write_report, AgentReport, Certificate, CertificateStatus, PhaseMetrics,
    PhaseReport,
};
