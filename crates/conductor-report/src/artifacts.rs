//! Reads everything an agent left in its state directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use conductor_core::config::{CONTINUATION_FILE, DEFAULT_CHECKLIST_FILE, DEFAULT_NARRATIVE_FILE};
use conductor_core::narrative::{self, NarrativeSummary};
use conductor_core::{checklist, ChecklistError};
use conductor_models::{Agent, Checklist};

use crate::error::{ReportError, Result};

/// How deep to descend into an agent's state directory.
const MAX_DEPTH: usize = 4;

/// Artifacts found for one agent. Every part is optional.
#[derive(Debug, Clone)]
pub struct AgentArtifacts {
    pub agent: Agent,
    pub checklist: Option<Checklist>,
    /// Raw narrative text.
    pub narrative: Option<String>,
    /// What could be extracted from the narrative.
    pub summary: NarrativeSummary,
    /// Other files, relative to the state directory, sorted.
    pub other_files: Vec<PathBuf>,
    /// Latest modification time across everything read.
    pub last_modified: Option<DateTime<Utc>>,
}

impl AgentArtifacts {
    /// Artifacts for an agent with nothing on disk.
    pub fn empty(agent: &Agent) -> Self {
        Self {
            agent: agent.clone(),
            checklist: None,
            narrative: None,
            summary: NarrativeSummary::default(),
            other_files: Vec::new(),
            last_modified: None,
        }
    }

    pub fn total_tasks(&self) -> usize {
        self.checklist.as_ref().map_or(0, |c| c.total())
    }

    pub fn completed_tasks(&self) -> usize {
        self.checklist
            .as_ref()
            .map_or(0, |c| c.count(conductor_models::ChecklistStatus::Completed))
    }

    pub fn is_complete(&self) -> bool {
        self.checklist.as_ref().is_some_and(|c| c.is_complete())
    }
}

/// Reads agent artifacts by well-known file names.
#[derive(Debug, Clone)]
pub struct ArtifactReader {
    checklist_file: String,
    narrative_file: String,
}

impl Default for ArtifactReader {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKLIST_FILE, DEFAULT_NARRATIVE_FILE)
    }
}

impl ArtifactReader {
    pub fn new(checklist_file: impl Into<String>, narrative_file: impl Into<String>) -> Self {
        Self {
            checklist_file: checklist_file.into(),
            narrative_file: narrative_file.into(),
        }
    }

    /// Reads one agent's state directory.
    ///
    /// Missing files are simply absent. Unreadable ones are logged and
    /// skipped so a single bad agent never spoils a report.
    pub fn read_agent(&self, agent: &Agent) -> AgentArtifacts {
        let mut artifacts = AgentArtifacts::empty(agent);
        if !agent.state_dir.is_dir() {
            debug!(agent_id = %agent.id, "no state directory");
            return artifacts;
        }

        let checklist_path = agent.file(&self.checklist_file);
        if let Some((bytes, modified)) = read_optional(agent, &checklist_path) {
            match checklist::parse_bytes(&bytes) {
                Ok(parsed) => artifacts.checklist = Some(parsed),
                Err(ChecklistError::NotText(e)) => {
                    warn!(agent_id = %agent.id, error = %e, "checklist is not text");
                }
            }
            bump(&mut artifacts.last_modified, modified);
        }

        let narrative_path = agent.file(&self.narrative_file);
        if let Some((bytes, modified)) = read_optional(agent, &narrative_path) {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            artifacts.summary = narrative::scan(&text);
            artifacts.narrative = Some(text);
            bump(&mut artifacts.last_modified, modified);
        }

        match list_files(&agent.state_dir) {
            Ok(files) => {
                let skip = [
                    Path::new(&self.checklist_file),
                    Path::new(&self.narrative_file),
                    Path::new(CONTINUATION_FILE),
                ];
                for (rel, modified) in files {
                    if skip.contains(&rel.as_path()) {
                        continue;
                    }
                    bump(&mut artifacts.last_modified, modified);
                    artifacts.other_files.push(rel);
                }
            }
            Err(e) => warn!(agent_id = %agent.id, error = %e, "failed to list state directory"),
        }

        artifacts
    }

    /// Reads several agents in order.
    pub fn read_all<'a>(&self, agents: impl IntoIterator<Item = &'a Agent>) -> Vec<AgentArtifacts> {
        agents.into_iter().map(|a| self.read_agent(a)).collect()
    }
}

fn bump(latest: &mut Option<DateTime<Utc>>, candidate: DateTime<Utc>) {
    if latest.map_or(true, |l| candidate > l) {
        *latest = Some(candidate);
    }
}

fn read_optional(agent: &Agent, path: &Path) -> Option<(Vec<u8>, DateTime<Utc>)> {
    let result = fs::metadata(path).and_then(|m| {
        let modified: DateTime<Utc> = m.modified()?.into();
        Ok((fs::read(path)?, modified))
    });
    match result {
        Ok(found) => Some(found),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!(agent_id = %agent.id, path = %path.display(), error = %e, "failed to read artifact");
            None
        }
    }
}

/// Lists regular files under `root`, relative to it, skipping hidden entries.
fn list_files(root: &Path) -> Result<Vec<(PathBuf, DateTime<Utc>)>> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| ReportError::ListError {
            path: dir.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                if depth + 1 < MAX_DEPTH {
                    pending.push((path, depth + 1));
                }
            } else if metadata.is_file() {
                let modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                if let Ok(rel) = path.strip_prefix(root) {
                    found.push((rel.to_path_buf(), modified));
                }
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_models::AgentRole;
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory_reads_empty() {
        let dir = tempdir().unwrap();
        let agent = Agent::new("fe", AgentRole::Frontend, dir.path().join("absent"));

        let artifacts = ArtifactReader::default().read_agent(&agent);
        assert!(artifacts.checklist.is_none());
        assert!(artifacts.narrative.is_none());
        assert!(artifacts.other_files.is_empty());
        assert!(artifacts.last_modified.is_none());
        assert_eq!(artifacts.total_tasks(), 0);
    }

    #[test]
    fn test_reads_everything_present() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("task.md"), "# UI\n- [x] Nav\n- [ ] Footer\n").unwrap();
        fs::write(
            dir.path().join("walkthrough.md"),
            "# Done\n![nav](media/nav.png)\n- ✅ nav renders\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("media")).unwrap();
        fs::write(dir.path().join("media/nav.png"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("continuation_request.json"), "{}").unwrap();
        fs::write(dir.path().join(".hidden"), "x").unwrap();

        let agent = Agent::new("fe", AgentRole::Frontend, dir.path());
        let artifacts = ArtifactReader::default().read_agent(&agent);

        assert_eq!(artifacts.total_tasks(), 2);
        assert_eq!(artifacts.completed_tasks(), 1);
        assert!(!artifacts.is_complete());
        assert_eq!(artifacts.summary.evidence_count(), 1);
        assert_eq!(artifacts.summary.passed(), 1);
        assert_eq!(artifacts.other_files, vec![PathBuf::from("media").join("nav.png")]);
        assert!(artifacts.last_modified.is_some());
    }

    #[test]
    fn test_custom_file_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("todo.md"), "- [x] only\n").unwrap();
        let agent = Agent::new("be", AgentRole::Backend, dir.path());

        let artifacts = ArtifactReader::new("todo.md", "notes.md").read_agent(&agent);
        assert!(artifacts.is_complete());
        assert!(artifacts.other_files.is_empty());
    }
}
