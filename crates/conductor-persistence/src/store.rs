//! Coordination store: the shared record of phase tasks and heartbeats.
//!
//! Every operation is a full read-modify-write of the shared document with
//! no optimistic concurrency check. That is only safe while a single
//! coordinator process writes the store; two coordinators against the same
//! document is unsupported and the later writer wins.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, trace};

use conductor_models::{
    CoordinationDocument, Heartbeat, PhaseId, PhaseState, PhaseStatus, TaskDispatch, TaskId,
    TaskStatus,
};

use crate::atomic::{atomic_write, read_to_string_optional};
use crate::block::{self, COORDINATION_BLOCK};
use crate::error::{PersistenceError, Result};

fn decode<T: serde::de::DeserializeOwned>(key: &str, payload: &str) -> Result<T> {
    serde_json::from_str(payload).map_err(|e| PersistenceError::CorruptBlock {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Keyed storage for coordinator-owned records.
///
/// Implementors provide raw named-block access; the typed operations are
/// built on top as read-modify-write sequences.
pub trait CoordinationStore: Send + Sync {
    /// Raw JSON payload of a named block, or `None` if absent.
    fn load_block(&self, key: &str) -> Result<Option<String>>;

    /// Replace a named block in place, or append it.
    fn save_block(&self, key: &str, payload: &str) -> Result<()>;

    /// Reads the coordination document. `None` until one has been written.
    fn read(&self) -> Result<Option<CoordinationDocument>> {
        match self.load_block(COORDINATION_BLOCK)? {
            Some(payload) => decode(COORDINATION_BLOCK, &payload).map(Some),
            None => Ok(None),
        }
    }

    /// Writes the coordination document as-is.
    fn write(&self, doc: &CoordinationDocument) -> Result<()> {
        let payload = serde_json::to_string_pretty(doc)?;
        self.save_block(COORDINATION_BLOCK, &payload)
    }

    /// Read (or start from an empty document), apply `f`, bump the revision
    /// and write back. Nothing is written if `f` fails.
    fn modify(
        &self,
        f: &mut dyn FnMut(&mut CoordinationDocument) -> Result<()>,
    ) -> Result<CoordinationDocument> {
        let mut doc = self.read()?.unwrap_or_default();
        f(&mut doc)?;
        doc.revision += 1;
        self.write(&doc)?;
        trace!(revision = doc.revision, "coordination document updated");
        Ok(doc)
    }

    /// Replaces the task with the same id, or appends it.
    fn upsert_task(&self, task: TaskDispatch) -> Result<()> {
        let mut task = Some(task);
        self.modify(&mut |doc| {
            if let Some(task) = task.take() {
                let replaced = doc.phase.upsert_task(task, Utc::now());
                debug!(replaced, "task upserted");
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Transitions a task, stamping completion time when it becomes complete.
    ///
    /// # Errors
    /// `NotFound` if no task has this id.
    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<TaskDispatch> {
        let mut updated = None;
        self.modify(&mut |doc| {
            let task = doc
                .phase
                .set_task_status(id, status, Utc::now())
                .ok_or_else(|| PersistenceError::NotFound {
                    kind: "task".to_string(),
                    id: id.to_string(),
                })?;
            updated = Some(task.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| PersistenceError::InvalidData("task update lost".to_string()))
    }

    /// Sets the phase-level status.
    fn set_phase_status(&self, status: PhaseStatus) -> Result<PhaseState> {
        let doc = self.modify(&mut |doc| {
            doc.phase.status = status;
            doc.phase.updated_at = Utc::now();
            Ok(())
        })?;
        Ok(doc.phase)
    }

    /// Replaces the heartbeat for the same agent, or appends it.
    fn upsert_heartbeat(&self, heartbeat: Heartbeat) -> Result<()> {
        self.upsert_heartbeats(vec![heartbeat])
    }

    /// Upserts several heartbeats with a single write.
    fn upsert_heartbeats(&self, heartbeats: Vec<Heartbeat>) -> Result<()> {
        let mut heartbeats = Some(heartbeats);
        self.modify(&mut |doc| {
            for hb in heartbeats.take().into_iter().flatten() {
                doc.upsert_heartbeat(hb);
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Makes `phase` the current phase.
    ///
    /// A superseded phase that has tasks is archived to its own block first.
    /// Heartbeats carry over. Returns the id of the archived phase, if any.
    fn init_phase(&self, phase: PhaseState) -> Result<Option<PhaseId>> {
        let mut archived = None;
        if let Some(current) = self.read()? {
            if current.phase.id != phase.id && current.phase.total() > 0 {
                let key = block::archive_key(current.phase.id.as_str());
                self.save_block(&key, &serde_json::to_string_pretty(&current.phase)?)?;
                debug!(phase_id = %current.phase.id, key = %key, "archived superseded phase");
                archived = Some(current.phase.id);
            }
        }

        let mut phase = Some(phase);
        self.modify(&mut |doc| {
            if let Some(phase) = phase.take() {
                doc.phase = phase;
            }
            Ok(())
        })?;
        Ok(archived)
    }

    /// Reads an archived phase by id.
    fn archived_phase(&self, id: &PhaseId) -> Result<Option<PhaseState>> {
        let key = block::archive_key(id.as_str());
        match self.load_block(&key)? {
            Some(payload) => decode(&key, &payload).map(Some),
            None => Ok(None),
        }
    }
}

/// Coordination store backed by a Markdown file on disk.
///
/// A missing file reads as "no document yet"; the first write creates it.
#[derive(Debug, Clone)]
pub struct FileCoordinationStore {
    path: PathBuf,
}

impl FileCoordinationStore {
    /// Creates a store for the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoordinationStore for FileCoordinationStore {
    fn load_block(&self, key: &str) -> Result<Option<String>> {
        match read_to_string_optional(&self.path)? {
            Some(text) => block::extract(&text, key),
            None => Ok(None),
        }
    }

    fn save_block(&self, key: &str, payload: &str) -> Result<()> {
        let text = read_to_string_optional(&self.path)?.unwrap_or_default();
        let updated = block::upsert(&text, key, payload)?;
        atomic_write(&self.path, updated.as_bytes())
    }
}

/// In-process coordination store with the same block semantics.
#[derive(Debug, Default)]
pub struct MemoryCoordinationStore {
    text: Mutex<String>,
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing document text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
        }
    }

    /// Current document text.
    pub fn text(&self) -> Result<String> {
        self.text
            .lock()
            .map(|t| t.clone())
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }
}

impl CoordinationStore for MemoryCoordinationStore {
    fn load_block(&self, key: &str) -> Result<Option<String>> {
        let text = self
            .text
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))?;
        block::extract(&text, key)
    }

    fn save_block(&self, key: &str, payload: &str) -> Result<()> {
        let mut text = self
            .text
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))?;
        *text = block::upsert(&text, key, payload)?;
        Ok(())
    }
}
