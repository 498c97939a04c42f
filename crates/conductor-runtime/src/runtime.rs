//! Coordinator runtime: the poll and phase-check loop.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use conductor_models::{Agent, AgentId, AgentStatus, ContinuationContext, Heartbeat};
use conductor_persistence::{CoordinationStore, PersistenceError};

use crate::aggregator::{PhaseAggregator, PhaseCheck};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::event::CoordinatorEvent;
use crate::injector::{continuation_prompt, ContinuationInjector};
use crate::poller::{PollOutcome, ProgressPoller};
use crate::registry::AgentRegistry;

const EVENT_CAPACITY: usize = 256;

/// One flow of control owning the poller, aggregator and injector.
///
/// Cycles run to completion one at a time; nothing here is shared with
/// another task except the registry and the event channel.
pub struct CoordinationLoop {
    config: RuntimeConfig,
    store: Arc<dyn CoordinationStore>,
    registry: Arc<RwLock<AgentRegistry>>,
    poller: ProgressPoller,
    aggregator: PhaseAggregator,
    injector: ContinuationInjector,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl CoordinationLoop {
    pub fn new(
        config: RuntimeConfig,
        store: Arc<dyn CoordinationStore>,
        registry: Arc<RwLock<AgentRegistry>>,
        events: broadcast::Sender<CoordinatorEvent>,
    ) -> Self {
        Self {
            poller: ProgressPoller::new(&config),
            aggregator: PhaseAggregator::new(),
            injector: ContinuationInjector::new(&config),
            config,
            store,
            registry,
            events,
        }
    }

    /// Replaces the injector (builder style).
    pub fn with_injector(mut self, injector: ContinuationInjector) -> Self {
        self.injector = injector;
        self
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Polls every agent, nudges idle ones and records heartbeats.
    pub async fn poll_cycle(&mut self) -> Result<PollOutcome> {
        let registry = self.registry.read().await.clone();
        let now = Utc::now();
        let outcome = self.poller.poll_all(&registry, now);

        for event in &outcome.events {
            self.emit(event.clone());
        }

        if self.config.auto_continue {
            let idle: Vec<AgentStatus> = outcome.needs_nudge().cloned().collect();
            for status in idle {
                if let Some(agent) = registry.get(&status.agent_id) {
                    self.nudge(agent, &status).await;
                }
            }
        }

        self.emit(CoordinatorEvent::PollCompleted {
            statuses: outcome.statuses.clone(),
        });

        if self.config.record_heartbeats {
            let heartbeats: Vec<Heartbeat> =
                outcome.statuses.iter().filter_map(Heartbeat::from_status).collect();
            if !heartbeats.is_empty() {
                self.store.upsert_heartbeats(heartbeats)?;
            }
        }

        Ok(outcome)
    }

    async fn nudge(&mut self, agent: &Agent, status: &AgentStatus) {
        let prompt = continuation_prompt(status);
        let context = ContinuationContext::from_status(status);
        let outcome = self.injector.inject(agent, prompt, Some(context)).await;
        if outcome.success() {
            self.poller.mark_nudged(status);
        }
        self.emit(CoordinatorEvent::ContinuationSent {
            agent_id: agent.id.clone(),
            outcome,
        });
    }

    /// Evaluates phase completion once.
    pub async fn phase_cycle(&mut self) -> Result<Option<PhaseCheck>> {
        let registry = self.registry.read().await.clone();
        let check = self
            .aggregator
            .check(self.store.as_ref(), &registry, &self.injector)
            .await?;

        if let Some(check) = &check {
            if check.fired {
                self.emit(CoordinatorEvent::PhaseComplete {
                    phase_id: check.phase_id.clone(),
                    total_tasks: check.total,
                    notified: check.notified(),
                });
            }
        }
        Ok(check)
    }

    fn report_failure(&self, cycle: &str, err: RuntimeError) {
        match &err {
            RuntimeError::Store(PersistenceError::CorruptBlock { key, reason }) => {
                warn!(cycle, key = %key, reason = %reason, "corrupt coordination block, skipping cycle");
            }
            _ => {
                error!(cycle, error = %err, "coordination cycle failed");
                self.emit(CoordinatorEvent::StoreUnavailable {
                    error: err.to_string(),
                });
            }
        }
    }

    /// Runs both timers until the shutdown flag flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut poll_ticker = interval(self.config.poll_interval);
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut phase_ticker = interval(self.config.phase_check_interval);
        phase_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let phase_enabled = self.config.phase_check_enabled;

        debug!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            phase_check_interval_ms = self.config.phase_check_interval.as_millis() as u64,
            phase_enabled,
            "starting coordination loop"
        );

        loop {
            tokio::select! {
                _ = poll_ticker.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        self.report_failure("poll", e);
                    }
                }
                _ = phase_ticker.tick(), if phase_enabled => {
                    if let Err(e) = self.phase_cycle().await {
                        self.report_failure("phase", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("coordination loop received shutdown signal");
                        break;
                    }
                }
            }
        }

        debug!("coordination loop stopped");
    }
}

/// Owns the background coordination task.
pub struct Coordinator {
    config: RuntimeConfig,
    store: Arc<dyn CoordinationStore>,
    registry: Arc<RwLock<AgentRegistry>>,
    events: broadcast::Sender<CoordinatorEvent>,
    loop_handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    started: bool,
}

impl Coordinator {
    pub fn new(
        config: RuntimeConfig,
        store: Arc<dyn CoordinationStore>,
        registry: AgentRegistry,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            store,
            registry: Arc::new(RwLock::new(registry)),
            events,
            loop_handle: None,
            shutdown_tx,
            shutdown_rx,
            started: false,
        }
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Builds a loop sharing this coordinator's registry and event channel.
    pub fn coordination_loop(&self) -> CoordinationLoop {
        CoordinationLoop::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.events.clone(),
        )
    }

    /// Spawns the coordination loop.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }

        info!(
            agents = self.registry.read().await.len(),
            "starting coordinator"
        );

        let coordination = self.coordination_loop();
        let shutdown_rx = self.shutdown_rx.clone();
        self.loop_handle = Some(tokio::spawn(coordination.run(shutdown_rx)));
        self.started = true;
        Ok(())
    }

    /// Signals the loop and waits for the in-flight cycle to finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.started {
            return Err(RuntimeError::NotStarted);
        }

        info!("shutting down coordinator");

        self.shutdown_tx.send(true).map_err(|e| {
            RuntimeError::Shutdown(format!("failed to send shutdown signal: {}", e))
        })?;

        if let Some(handle) = self.loop_handle.take() {
            handle.await.map_err(|e| {
                RuntimeError::Shutdown(format!("coordination task panicked: {}", e))
            })?;
        }

        self.started = false;
        info!("coordinator stopped");
        Ok(())
    }

    /// Adds an agent; picked up on the next cycle.
    pub async fn register(&self, agent: Agent) -> Result<()> {
        self.registry.write().await.register(agent)
    }

    /// Removes an agent.
    pub async fn deregister(&self, id: &AgentId) -> Result<Agent> {
        self.registry
            .write()
            .await
            .deregister(id)
            .ok_or_else(|| RuntimeError::AgentNotFound(id.to_string()))
    }

    /// Snapshot of the registered agents.
    pub async fn agents(&self) -> Vec<Agent> {
        self.registry.read().await.iter().cloned().collect()
    }

    /// Sends the current phase to the reviewer regardless of completion state.
    pub async fn trigger_review(&self) -> Result<PhaseCheck> {
        let registry = self.registry.read().await.clone();
        let injector = ContinuationInjector::new(&self.config);
        PhaseAggregator::new()
            .trigger_review(self.store.as_ref(), &registry, &injector)
            .await
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.started {
            let _ = self.shutdown_tx.send(true);
        }
    }
}
