//! Phase and task dispatch types.
//!
//! A phase is a named set of tasks assigned across agents. Tasks are updated
//! in place by identifier and never deleted, only transitioned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentRole;
use crate::ids::{PhaseId, TaskId};

/// Status of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet handed to an agent.
    #[default]
    Pending,
    /// Handed to the assignee.
    Dispatched,
    /// Assignee reports work under way.
    InProgress,
    /// Waiting on a dependency or external input.
    Blocked,
    /// Done.
    Complete,
}

impl TaskStatus {
    /// Returns the snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "dispatched" => Ok(TaskStatus::Dispatched),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "complete" | "completed" | "done" => Ok(TaskStatus::Complete),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// Phase-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Tasks are being defined.
    #[default]
    Planning,
    /// Work is under way.
    InProgress,
    /// All tasks complete; handed to the reviewer.
    Review,
    /// Reviewer accepted the phase.
    Complete,
}

impl PhaseStatus {
    /// Returns the snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Planning => "planning",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Review => "review",
            PhaseStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "planning" => Ok(PhaseStatus::Planning),
            "in_progress" => Ok(PhaseStatus::InProgress),
            "review" => Ok(PhaseStatus::Review),
            "complete" => Ok(PhaseStatus::Complete),
            other => Err(format!("unknown phase status: {}", other)),
        }
    }
}

/// A unit of work assigned to one agent role within a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDispatch {
    /// Unique within the phase.
    pub id: TaskId,
    /// Role expected to carry out the task.
    pub assignee: AgentRole,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Tasks that must complete first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskDispatch {
    /// Creates a pending task.
    pub fn new(id: impl Into<TaskId>, assignee: AgentRole, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            assignee,
            description: description.into(),
            status: TaskStatus::Pending,
            depends_on: Vec::new(),
            dispatched_at: None,
            completed_at: None,
        }
    }

    /// Sets the status (builder style).
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a dependency (builder style).
    pub fn depends_on(mut self, id: impl Into<TaskId>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Transitions to `status`, stamping dispatch and completion times.
    ///
    /// `completed_at` is cleared if a complete task regresses.
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            TaskStatus::Complete => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(now);
                }
            }
            TaskStatus::Dispatched => {
                if self.dispatched_at.is_none() {
                    self.dispatched_at = Some(now);
                }
                self.completed_at = None;
            }
            _ => self.completed_at = None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }
}

/// All task dispatch records for one named phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub id: PhaseId,
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default)]
    pub tasks: Vec<TaskDispatch>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhaseState {
    /// Creates an empty phase in `planning`.
    pub fn new(id: impl Into<PhaseId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: PhaseStatus::Planning,
            tasks: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Adds tasks (builder style).
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskDispatch>) -> Self {
        for task in tasks {
            self.upsert_task(task, self.updated_at);
        }
        self
    }

    /// Looks up a task by id.
    pub fn task(&self, id: &TaskId) -> Option<&TaskDispatch> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Replaces the task with the same id, or appends it.
    ///
    /// Returns true if an existing record was replaced.
    pub fn upsert_task(&mut self, mut task: TaskDispatch, now: DateTime<Utc>) -> bool {
        if task.is_complete() && task.completed_at.is_none() {
            task.completed_at = Some(now);
        }
        self.updated_at = now;
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => {
                *existing = task;
                true
            }
            None => {
                self.tasks.push(task);
                false
            }
        }
    }

    /// Transitions a task by id. Returns the updated record, or `None` if unknown.
    pub fn set_task_status(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Option<&TaskDispatch> {
        let task = self.tasks.iter_mut().find(|t| &t.id == id)?;
        task.transition(status, now);
        self.updated_at = now;
        Some(task)
    }

    /// Number of tasks.
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    /// Number of complete tasks.
    pub fn completed(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_complete()).count()
    }

    /// True when there is at least one task and all are complete.
    pub fn is_complete(&self) -> bool {
        self.total() > 0 && self.completed() == self.total()
    }

    /// Tasks assigned to a role, in document order.
    pub fn tasks_for(&self, role: AgentRole) -> impl Iterator<Item = &TaskDispatch> {
        self.tasks.iter().filter(move |t| t.assignee == role)
    }
}
