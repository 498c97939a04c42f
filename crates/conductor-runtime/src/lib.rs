//! Coordination runtime for Conductor.
//!
//! This crate drives the coordination engine:
//! - `ProgressPoller` - reads every agent's checklist, derives liveness and
//!   completion, emits edge-triggered events
//! - `ContinuationInjector` - places continuation requests for idle agents
//!   through prioritized delivery strategies
//! - `PhaseAggregator` - decides phase completion from the coordination
//!   store and hands the phase to the reviewer exactly once per episode
//! - `Coordinator` - runs the poll and phase-check timers on one task
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use conductor_persistence::FileCoordinationStore;
//! use conductor_runtime::{AgentRegistry, Coordinator, RuntimeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileCoordinationStore::new("COORDINATION.md"));
//!     let registry = AgentRegistry::from_agents(settings.agents())?;
//!     let mut coordinator = Coordinator::new(RuntimeConfig::default(), store, registry);
//!
//!     let mut events = coordinator.subscribe();
//!     coordinator.start().await?;
//!
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}: {:?}", event.name(), event);
//!         }
//!     });
//!
//!     tokio::signal::ctrl_c().await?;
//!     coordinator.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Scheduling
//!
//! All coordinator logic runs on a single task. The poll and phase-check
//! timers are arms of one `select!`, so cycles never overlap; slow cycles
//! cause skipped ticks rather than concurrent ones. The aggregator's
//! "last known complete" flag therefore needs no lock.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod injector;
pub mod poller;
pub mod registry;
pub mod runtime;

pub use aggregator::{CompletionLatch, PhaseAggregator, PhaseCheck};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use event::CoordinatorEvent;
pub use injector::{
    ContinuationInjector, DeliveryStrategy, FileDropStrategy, InjectionOutcome, InjectionResult,
    ProcessStrategy, RealtimeStrategy, StrategyKind,
};
pub use poller::{PollOutcome, ProgressPoller};
pub use registry::AgentRegistry;
pub use runtime::{CoordinationLoop, Coordinator};
