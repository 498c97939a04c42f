//! Phase report aggregation and rendering.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use conductor_core::narrative::{MediaKind, MediaRef, NarrativeSummary};
use conductor_models::{AgentId, AgentRole, PhaseId};
use conductor_persistence::atomic::atomic_write;

use crate::artifacts::AgentArtifacts;
use crate::error::Result;

/// Certificate status derived from overall completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Complete,
    Partial,
    InProgress,
}

impl CertificateStatus {
    /// `complete` at 100%, `partial` above zero, otherwise `in_progress`.
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            100.. => CertificateStatus::Complete,
            1..=99 => CertificateStatus::Partial,
            0 => CertificateStatus::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Complete => "complete",
            CertificateStatus::Partial => "partial",
            CertificateStatus::InProgress => "in_progress",
        }
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals across every agent in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseMetrics {
    pub agents: usize,
    pub agents_complete: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub percent_complete: u8,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_skipped: usize,
    pub evidence: usize,
}

/// Completion certificate for the phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub phase_id: PhaseId,
    pub status: CertificateStatus,
    /// Earliest agent activity unless set from the phase record.
    pub started_at: Option<DateTime<Utc>>,
    /// Set only when the phase is complete.
    pub completed_at: Option<DateTime<Utc>>,
}

/// One agent's section of the report.
#[derive(Debug, Clone)]
pub struct AgentReport {
    pub agent_id: AgentId,
    pub role: AgentRole,
    pub state_dir: PathBuf,
    pub total: usize,
    pub completed: usize,
    pub is_complete: bool,
    pub narrative: Option<String>,
    pub summary: NarrativeSummary,
    pub last_modified: Option<DateTime<Utc>>,
}

impl AgentReport {
    fn from_artifacts(artifacts: &AgentArtifacts) -> Self {
        Self {
            agent_id: artifacts.agent.id.clone(),
            role: artifacts.agent.role,
            state_dir: artifacts.agent.state_dir.clone(),
            total: artifacts.total_tasks(),
            completed: artifacts.completed_tasks(),
            is_complete: artifacts.is_complete(),
            narrative: artifacts.narrative.clone(),
            summary: artifacts.summary.clone(),
            last_modified: artifacts.last_modified,
        }
    }

    fn anchor(&self) -> String {
        slug(&format!("{} {}", self.agent_id, self.role))
    }

    /// Link target for a media reference, resolved against the state directory.
    fn media_target(&self, media: &MediaRef) -> String {
        let target = media.target.as_str();
        if target.contains("://") || Path::new(target).is_absolute() {
            target.to_string()
        } else {
            self.state_dir.join(target).display().to_string()
        }
    }
}

/// Combined report across all agents of a phase.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase_id: PhaseId,
    pub generated_at: DateTime<Utc>,
    pub agents: Vec<AgentReport>,
    pub metrics: PhaseMetrics,
    pub certificate: Certificate,
}

/// Aggregates per-agent artifacts into a phase report.
pub fn aggregate(
    phase_id: impl Into<PhaseId>,
    artifacts: &[AgentArtifacts],
    now: DateTime<Utc>,
) -> PhaseReport {
    let phase_id = phase_id.into();
    let agents: Vec<AgentReport> = artifacts.iter().map(AgentReport::from_artifacts).collect();

    let mut metrics = PhaseMetrics {
        agents: agents.len(),
        ..PhaseMetrics::default()
    };
    for agent in &agents {
        metrics.total_tasks += agent.total;
        metrics.completed_tasks += agent.completed;
        metrics.agents_complete += usize::from(agent.is_complete);
        metrics.tests_passed += agent.summary.passed();
        metrics.tests_failed += agent.summary.failed();
        metrics.tests_skipped += agent.summary.skipped();
        metrics.evidence += agent.summary.evidence_count();
    }
    metrics.percent_complete = percent(metrics.completed_tasks, metrics.total_tasks);

    let status = CertificateStatus::from_percent(metrics.percent_complete);
    let certificate = Certificate {
        phase_id: phase_id.clone(),
        status,
        started_at: agents.iter().filter_map(|a| a.last_modified).min(),
        completed_at: (status == CertificateStatus::Complete).then_some(now),
    };

    PhaseReport {
        phase_id,
        generated_at: now,
        agents,
        metrics,
        certificate,
    }
}

fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// GitHub-style heading anchor.
fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Levels added to narrative headings so they nest under the agent section.
const NARRATIVE_HEADING_SHIFT: usize = 2;

/// Pushes every ATX heading in `text` down `by` levels, capped at six.
/// Lines inside fenced code are left alone.
fn demote_headings(text: &str, by: usize) -> String {
    let mut fence: Option<&str> = None;
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            out.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
        } else if trimmed.starts_with("~~~") {
            fence = Some("~~~");
        }

        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let rest = &trimmed[level..];
        let is_heading = fence.is_none()
            && (1..=6).contains(&level)
            && (rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t'));
        if is_heading {
            out.push(format!("{}{}", "#".repeat((level + by).min(6)), rest));
        } else {
            out.push(line.to_string());
        }
    }
    out.join("\n")
}

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl PhaseReport {
    /// Renders the report as Markdown.
    pub fn render(&self) -> String {
        let mut out = format!("# Phase {} Report\n\n", self.phase_id);
        out.push_str(&format!("Generated {}\n\n", timestamp(Some(self.generated_at))));

        self.render_summary(&mut out);
        self.render_certificate(&mut out);
        self.render_contents(&mut out);
        self.render_narratives(&mut out);
        self.render_gallery(&mut out);
        out
    }

    fn render_summary(&self, out: &mut String) {
        out.push_str("## Summary\n\n");
        out.push_str("| Agent | Role | Tasks | Complete | Tests (pass/fail/skip) | Evidence |\n");
        out.push_str("|-------|------|-------|----------|------------------------|----------|\n");
        for agent in &self.agents {
            out.push_str(&format!(
                "| {} | {} | {}/{} | {} | {}/{}/{} | {} |\n",
                agent.agent_id,
                agent.role,
                agent.completed,
                agent.total,
                if agent.is_complete { "yes" } else { "no" },
                agent.summary.passed(),
                agent.summary.failed(),
                agent.summary.skipped(),
                agent.summary.evidence_count(),
            ));
        }
        let m = &self.metrics;
        out.push_str(&format!(
            "| **Total** | | {}/{} | {}/{} | {}/{}/{} | {} |\n\n",
            m.completed_tasks,
            m.total_tasks,
            m.agents_complete,
            m.agents,
            m.tests_passed,
            m.tests_failed,
            m.tests_skipped,
            m.evidence,
        ));
    }

    fn render_certificate(&self, out: &mut String) {
        let c = &self.certificate;
        out.push_str("## Certificate\n\n");
        out.push_str("```text\n");
        out.push_str(&format!("Phase:      {}\n", c.phase_id));
        out.push_str(&format!("Status:     {}\n", c.status));
        out.push_str(&format!("Started:    {}\n", timestamp(c.started_at)));
        out.push_str(&format!("Completed:  {}\n", timestamp(c.completed_at)));
        out.push_str(&format!(
            "Tasks:      {}/{} ({}%)\n",
            self.metrics.completed_tasks, self.metrics.total_tasks, self.metrics.percent_complete
        ));
        out.push_str(&format!(
            "Agents:     {}/{} complete\n",
            self.metrics.agents_complete, self.metrics.agents
        ));
        out.push_str("```\n\n");
    }

    fn render_contents(&self, out: &mut String) {
        out.push_str("## Contents\n\n");
        for agent in &self.agents {
            out.push_str(&format!(
                "- [{} ({})](#{})\n",
                agent.agent_id,
                agent.role,
                agent.anchor()
            ));
            for heading in &agent.summary.headings {
                let indent = "  ".repeat(usize::from(heading.level.max(1)));
                out.push_str(&format!("{}- {}\n", indent, heading.text));
            }
        }
        out.push('\n');
    }

    fn render_narratives(&self, out: &mut String) {
        for agent in &self.agents {
            out.push_str(&format!("## {} {}\n\n", agent.agent_id, agent.role));
            match &agent.narrative {
                Some(text) => {
                    out.push_str(&demote_headings(text.trim_end(), NARRATIVE_HEADING_SHIFT));
                    out.push_str("\n\n");
                }
                None => out.push_str("_No narrative provided._\n\n"),
            }
        }
    }

    fn render_gallery(&self, out: &mut String) {
        if self.metrics.evidence == 0 {
            return;
        }
        out.push_str("## Media Gallery\n\n");
        for agent in self.agents.iter().filter(|a| !a.summary.media.is_empty()) {
            out.push_str(&format!("### {}\n\n", agent.agent_id));
            for media in &agent.summary.media {
                let target = agent.media_target(media);
                match media.kind {
                    MediaKind::Image => {
                        out.push_str(&format!("![{}]({})\n", media.label, target))
                    }
                    MediaKind::Video => out.push_str(&format!(
                        "- video: [{}]({})\n",
                        if media.label.is_empty() { "recording" } else { media.label.as_str() },
                        target
                    )),
                }
            }
            out.push('\n');
        }
    }

    /// File name the report is written under.
    pub fn file_name(&self) -> String {
        let safe: String = self
            .phase_id
            .as_str()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        format!("{}-report.md", safe)
    }
}

/// Renders and atomically writes the report into `dir`.
pub fn write_report(report: &PhaseReport, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(report.file_name());
    atomic_write(&path, report.render().as_bytes())?;
    info!(phase_id = %report.phase_id, path = %path.display(), "phase report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactReader;
    use conductor_models::{Agent, ChecklistItem, ChecklistStatus, Checklist};
    use std::fs;
    use tempfile::tempdir;

    fn artifacts(id: &str, total: usize, completed: usize) -> AgentArtifacts {
        let agent = Agent::new(id, AgentRole::Frontend, format!("/b/{}", id));
        let mut artifacts = AgentArtifacts::empty(&agent);
        artifacts.checklist = Some(Checklist {
            title: id.to_string(),
            items: (0..total)
                .map(|i| ChecklistItem {
                    description: format!("item {}", i),
                    status: if i < completed {
                        ChecklistStatus::Completed
                    } else {
                        ChecklistStatus::Pending
                    },
                    position: i,
                })
                .collect(),
        });
        artifacts
    }

    #[test]
    fn test_metrics_across_agents() {
        let report = aggregate(
            "p3",
            &[artifacts("a", 2, 2), artifacts("b", 3, 1), artifacts("c", 0, 0)],
            Utc::now(),
        );

        assert_eq!(report.metrics.total_tasks, 5);
        assert_eq!(report.metrics.completed_tasks, 3);
        assert_eq!(report.metrics.percent_complete, 60);
        assert_eq!(report.metrics.agents, 3);
        assert_eq!(report.metrics.agents_complete, 1);
        assert_eq!(report.certificate.status, CertificateStatus::Partial);
        assert!(report.certificate.completed_at.is_none());
    }

    #[test]
    fn test_certificate_status() {
        assert_eq!(CertificateStatus::from_percent(100), CertificateStatus::Complete);
        assert_eq!(CertificateStatus::from_percent(1), CertificateStatus::Partial);
        assert_eq!(CertificateStatus::from_percent(0), CertificateStatus::InProgress);

        let now = Utc::now();
        let report = aggregate("p1", &[artifacts("a", 2, 2)], now);
        assert_eq!(report.certificate.status, CertificateStatus::Complete);
        assert_eq!(report.certificate.completed_at, Some(now));

        let report = aggregate("p1", &[], now);
        assert_eq!(report.metrics.percent_complete, 0);
        assert_eq!(report.certificate.status, CertificateStatus::InProgress);
    }

    #[test]
    fn test_render_sections() {
        let dir = tempdir().unwrap();
        let fe = dir.path().join("fe");
        fs::create_dir_all(&fe).unwrap();
        fs::write(fe.join("task.md"), "- [x] Nav\n").unwrap();
        fs::write(
            fe.join("walkthrough.md"),
            "# Nav walkthrough\n\n## Evidence\n![nav bar](shots/nav.png)\n[run](shots/run.mp4)\n- ✅ nav renders\n- ❌ mobile menu\n",
        )
        .unwrap();
        let be = dir.path().join("be");
        let agents = vec![
            Agent::new("fe", AgentRole::Frontend, &fe),
            Agent::new("be", AgentRole::Backend, &be),
        ];

        let reader = ArtifactReader::default();
        let report = aggregate("p2", &reader.read_all(&agents), Utc::now());
        let text = report.render();

        assert!(text.starts_with("# Phase p2 Report"));
        assert!(text.contains("| fe | frontend | 1/1 | yes | 1/1/0 | 2 |"));
        assert!(text.contains("| be | backend | 0/0 | no | 0/0/0 | 0 |"));
        assert!(text.contains("Status:     complete"));
        assert!(text.contains("- [fe (frontend)](#fe-frontend)"));
        assert!(text.contains("    - Evidence"));
        assert!(text.contains("\n### Nav walkthrough\n"));
        assert!(text.contains("\n#### Evidence\n"));
        assert!(!text.lines().any(|l| l == "# Nav walkthrough"));
        assert!(text.contains("## Evidence"));
        assert!(text.contains("_No narrative provided._"));
        assert!(text.contains("## Media Gallery"));
        assert!(text.contains(&format!("![nav bar]({})", fe.join("shots/nav.png").display())));
        assert!(text.contains("- video: [run]"));
    }

    #[test]
    fn test_demote_headings() {
        let text = "# Title\nbody #1\n###### Deep\n#hashtag\n```sh\n# comment\n```\n## Next";
        assert_eq!(
            demote_headings(text, 2),
            "### Title\nbody #1\n###### Deep\n#hashtag\n```sh\n# comment\n```\n#### Next"
        );
    }

    #[test]
    fn test_write_report() {
        let dir = tempdir().unwrap();
        let report = aggregate("phase 2/ui", &[artifacts("a", 1, 1)], Utc::now());

        let path = write_report(&report, &dir.path().join("reports")).unwrap();
        assert_eq!(path.file_name().unwrap(), "phase-2-ui-report.md");
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("## Certificate"));
    }

    #[test]
    fn test_metrics_serialize() {
        let report = aggregate("p1", &[artifacts("a", 4, 1)], Utc::now());
        let json = serde_json::to_value(&report.certificate).unwrap();
        assert_eq!(json["status"], "partial");
        assert_eq!(json["phase_id"], "p1");
    }
}
