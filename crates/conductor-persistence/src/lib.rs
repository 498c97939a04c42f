//! Persistence layer for Conductor.
//!
//! The coordination store keeps the current phase and agent heartbeats as a
//! JSON "memory block" embedded in an otherwise human-authored Markdown
//! document. Updates replace only the named block; every byte outside it
//! is left untouched. Files are written atomically (temp file, then rename).
//!
//! # Example
//!
//! ```no_run
//! use conductor_persistence::{CoordinationStore, FileCoordinationStore};
//! use conductor_models::{AgentRole, TaskDispatch, TaskStatus};
//!
//! let store = FileCoordinationStore::new("/srv/project/COORDINATION.md");
//! store
//!     .upsert_task(TaskDispatch::new("P2-001", AgentRole::Frontend, "Login form"))
//!     .unwrap();
//! store.set_task_status(&"P2-001".into(), TaskStatus::Complete).unwrap();
//!
//! let doc = store.read().unwrap().unwrap();
//! assert!(doc.phase.is_complete());
//! ```

pub mod atomic;
pub mod block;
pub mod error;
pub mod store;

pub use block::COORDINATION_BLOCK;
pub use error::{PersistenceError, Result};
pub use store::{CoordinationStore, FileCoordinationStore, MemoryCoordinationStore};
