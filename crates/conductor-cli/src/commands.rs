//! Command handlers for CLI subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use conductor_core::{config, set_status, Settings};
use conductor_models::{
    AgentId, AgentStatus, ChecklistStatus, PhaseState, PhaseStatus, TaskDispatch, TaskStatus,
};
use conductor_persistence::atomic::{atomic_write, read_to_string_optional};
use conductor_persistence::{CoordinationStore, FileCoordinationStore};
use conductor_report::{aggregate, write_report, ArtifactReader};
use conductor_runtime::{
    AgentRegistry, ContinuationInjector, Coordinator, CoordinatorEvent, ProgressPoller,
    RuntimeConfig,
};

use crate::cli::{Cli, Commands, OutputFormat, PhaseCommand, TaskCommand, TaskSpec};

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Everything a command needs, resolved from settings and flags.
pub struct Context {
    pub settings: Settings,
    pub document: PathBuf,
    pub registry: AgentRegistry,
}

impl Context {
    /// Loads settings (defaults when no file exists) and applies overrides.
    pub fn load(config_path: Option<&Path>, document: Option<PathBuf>) -> Result<Self> {
        let path = config_path.map(Path::to_path_buf).unwrap_or_else(config::config_file);
        let settings = match Settings::load_optional(&path)? {
            Some(settings) => settings,
            None => {
                info!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
        };
        let document = document.unwrap_or_else(|| settings.coordination_document());
        let registry = AgentRegistry::from_agents(settings.agents())?;
        Ok(Self {
            settings,
            document,
            registry,
        })
    }

    pub fn store(&self) -> FileCoordinationStore {
        FileCoordinationStore::new(&self.document)
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::from(&self.settings)
    }

    fn agent(&self, id: &str) -> Result<&conductor_models::Agent> {
        self.registry
            .get(&AgentId::from(id))
            .ok_or_else(|| format!("Agent not found: {}", id).into())
    }
}

/// Execute a CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let ctx = Context::load(cli.config.as_deref(), cli.document)?;

    match cli.command {
        Commands::Watch { once } => cmd_watch(&ctx, once).await,
        Commands::Status { format } => cmd_status(&ctx, format),
        Commands::Report { phase, out, stdout } => cmd_report(&ctx, phase, out, stdout),
        Commands::Review => cmd_review(&ctx).await,
        Commands::Phase { action } => match action {
            PhaseCommand::Init { id, tasks } => cmd_phase_init(&ctx, &id, tasks),
            PhaseCommand::Show { format } => cmd_phase_show(&ctx, format),
            PhaseCommand::Set { status } => cmd_phase_set(&ctx, status),
        },
        Commands::Task { action } => match action {
            TaskCommand::Add {
                id,
                role,
                description,
                depends_on,
            } => {
                let mut task = TaskDispatch::new(id, role, description);
                for dep in depends_on {
                    task = task.depends_on(dep);
                }
                cmd_task_add(&ctx, task)
            }
            TaskCommand::Set { id, status } => cmd_task_set(&ctx, &id, status),
        },
        Commands::Mark {
            agent,
            position,
            status,
        } => cmd_mark(&ctx, &agent, position, &status),
        Commands::Consume { agent } => cmd_consume(&ctx, &agent),
    }
}

async fn cmd_watch(ctx: &Context, once: bool) -> Result<()> {
    if ctx.registry.is_empty() {
        warn!("no agents configured; add [[agents]] entries to the settings file");
    }

    let store = Arc::new(ctx.store());
    let coordinator = Coordinator::new(ctx.runtime_config(), store, ctx.registry.clone());
    let mut events = coordinator.subscribe();

    if once {
        let mut coordination = coordinator.coordination_loop();
        coordination.poll_cycle().await?;
        coordination.phase_cycle().await?;
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
        return Ok(());
    }

    let mut coordinator = coordinator;
    coordinator.start().await?;
    println!(
        "Watching {} agent(s); coordination document {}",
        ctx.registry.len(),
        ctx.document.display()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "event listener lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    coordinator.shutdown().await?;
    Ok(())
}

fn print_event(event: &CoordinatorEvent) {
    let time = Utc::now().format("%H:%M:%S");
    match event {
        CoordinatorEvent::AgentComplete { agent_id, total, .. } => {
            println!("{} {:<18} {} finished all {} items", time, event.name(), agent_id, total)
        }
        CoordinatorEvent::AgentIdle {
            agent_id,
            idle_secs,
            already_nudged,
        } => println!(
            "{} {:<18} {} idle for {}s{}",
            time,
            event.name(),
            agent_id,
            idle_secs,
            if *already_nudged { " (already nudged)" } else { "" }
        ),
        CoordinatorEvent::ContinuationSent { agent_id, outcome } => match outcome.delivered_by() {
            Some(strategy) => {
                println!("{} {:<18} {} via {}", time, event.name(), agent_id, strategy)
            }
            None => println!(
                "{} {:<18} {} failed: {}",
                time,
                event.name(),
                agent_id,
                outcome.summary()
            ),
        },
        CoordinatorEvent::PhaseComplete {
            phase_id,
            total_tasks,
            notified,
        } => println!(
            "{} {:<18} {} ({} tasks), reviewer {}",
            time,
            event.name(),
            phase_id,
            total_tasks,
            if *notified { "notified" } else { "NOT notified" }
        ),
        CoordinatorEvent::PollCompleted { .. } => {}
        CoordinatorEvent::StoreUnavailable { error } => {
            eprintln!("{} {:<18} {}", time, event.name(), error)
        }
    }
}

fn cmd_status(ctx: &Context, format: OutputFormat) -> Result<()> {
    let poller = ProgressPoller::new(&ctx.runtime_config());
    let now = Utc::now();
    let statuses: Vec<AgentStatus> = ctx
        .registry
        .iter()
        .map(|agent| poller.poll_agent(agent, now).unwrap_or_else(|| AgentStatus::empty(agent)))
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
        OutputFormat::Table => {
            if statuses.is_empty() {
                println!("No agents configured.");
                return Ok(());
            }
            println!(
                "{:<16} {:<12} {:>9} {:>5}  {:<8} CURRENT",
                "AGENT", "ROLE", "PROGRESS", "%", "STATE"
            );
            for s in &statuses {
                let state = if s.is_complete {
                    "complete"
                } else if s.is_idle {
                    "idle"
                } else if !s.has_data() {
                    "-"
                } else {
                    "working"
                };
                println!(
                    "{:<16} {:<12} {:>9} {:>4}%  {:<8} {}",
                    s.agent_id.as_str(),
                    s.role.as_str(),
                    format!("{}/{}", s.completed, s.total),
                    s.percent_complete(),
                    state,
                    s.current_task.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn cmd_report(
    ctx: &Context,
    phase: Option<String>,
    out: Option<PathBuf>,
    to_stdout: bool,
) -> Result<()> {
    let current = ctx.store().read()?.map(|doc| doc.phase);
    let phase_id = phase
        .or_else(|| current.as_ref().map(|p| p.id.to_string()))
        .ok_or("No phase given and no coordination document found")?;

    let reader = ArtifactReader::new(
        ctx.settings.artifacts.checklist_file.clone(),
        ctx.settings.artifacts.narrative_file.clone(),
    );
    let artifacts = reader.read_all(ctx.registry.iter());
    let mut report = aggregate(phase_id.as_str(), &artifacts, Utc::now());

    if let Some(phase) = current.filter(|p| p.id.as_str() == phase_id) {
        report.certificate.started_at = Some(phase.started_at);
    }

    if to_stdout {
        print!("{}", report.render());
        return Ok(());
    }

    let dir = out.unwrap_or_else(|| ctx.settings.reports_dir());
    let path = write_report(&report, &dir)?;
    println!(
        "Report for phase {} ({}%, {}) written to {}",
        report.phase_id,
        report.metrics.percent_complete,
        report.certificate.status,
        path.display()
    );
    Ok(())
}

async fn cmd_review(ctx: &Context) -> Result<()> {
    let coordinator = Coordinator::new(
        ctx.runtime_config(),
        Arc::new(ctx.store()),
        ctx.registry.clone(),
    );
    let check = coordinator.trigger_review().await?;
    match check.delivery.as_ref().and_then(|d| d.delivered_by()) {
        Some(strategy) => println!(
            "Sent phase {} ({}/{} tasks complete) to the reviewer via {}",
            check.phase_id, check.completed, check.total, strategy
        ),
        None => {
            let reason = check
                .delivery
                .as_ref()
                .map(|d| d.summary().to_string())
                .unwrap_or_default();
            return Err(format!("Reviewer notification failed: {}", reason).into());
        }
    }
    Ok(())
}

fn cmd_phase_init(ctx: &Context, id: &str, tasks: Vec<TaskSpec>) -> Result<()> {
    let tasks = tasks
        .into_iter()
        .map(|t| TaskDispatch::new(t.id, t.role, t.description));
    let phase = PhaseState::new(id).with_tasks(tasks);
    let count = phase.total();

    let archived = ctx.store().init_phase(phase)?;
    println!("Started phase {} with {} task(s)", id, count);
    if let Some(previous) = archived {
        println!("  Archived phase {}", previous);
    }
    Ok(())
}

fn cmd_phase_show(ctx: &Context, format: OutputFormat) -> Result<()> {
    let Some(doc) = ctx.store().read()? else {
        println!("No coordination document at {}", ctx.document.display());
        return Ok(());
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
        OutputFormat::Table => {
            let phase = &doc.phase;
            println!(
                "Phase {} [{}] {}/{} complete (revision {})",
                phase.id,
                phase.status,
                phase.completed(),
                phase.total(),
                doc.revision
            );
            for task in &phase.tasks {
                println!(
                    "  {:<10} {:<12} {:<12} {}",
                    task.id.as_str(),
                    task.assignee.as_str(),
                    task.status.as_str(),
                    task.description
                );
            }
            if !doc.heartbeats.is_empty() {
                println!("Heartbeats:");
                for hb in &doc.heartbeats {
                    println!(
                        "  {:<16} {:?} {}",
                        hb.agent_id.as_str(),
                        hb.status,
                        hb.last_seen.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }
    Ok(())
}

fn cmd_phase_set(ctx: &Context, status: PhaseStatus) -> Result<()> {
    let phase = ctx.store().set_phase_status(status)?;
    println!("Phase {} is now {}", phase.id, phase.status);
    Ok(())
}

fn cmd_task_add(ctx: &Context, task: TaskDispatch) -> Result<()> {
    let id = task.id.clone();
    ctx.store().upsert_task(task)?;
    println!("Saved task {}", id);
    Ok(())
}

fn cmd_task_set(ctx: &Context, id: &str, status: TaskStatus) -> Result<()> {
    let task = ctx.store().set_task_status(&id.into(), status)?;
    println!("Task {} is now {}", task.id, task.status);
    Ok(())
}

fn parse_checklist_status(s: &str) -> Result<ChecklistStatus> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "pending" | "todo" => Ok(ChecklistStatus::Pending),
        "in_progress" | "active" => Ok(ChecklistStatus::InProgress),
        "completed" | "complete" | "done" => Ok(ChecklistStatus::Completed),
        other => Err(format!("unknown checklist status: {}", other).into()),
    }
}

fn cmd_mark(ctx: &Context, agent_id: &str, position: usize, status: &str) -> Result<()> {
    let agent = ctx.agent(agent_id)?;
    let status = parse_checklist_status(status)?;
    let path = agent.file(&ctx.settings.artifacts.checklist_file);

    let text = read_to_string_optional(&path)?
        .ok_or_else(|| format!("No checklist at {}", path.display()))?;
    let updated = set_status(&text, position, status)
        .ok_or_else(|| format!("No checklist item at position {}", position))?;

    if updated != text {
        atomic_write(&path, updated.as_bytes())?;
    }
    println!("Marked item {} of {} as [{}]", position, agent.id, status.marker());
    Ok(())
}

fn cmd_consume(ctx: &Context, agent_id: &str) -> Result<()> {
    let agent = ctx.agent(agent_id)?;
    match ContinuationInjector::consume(agent)? {
        Some(request) => println!("{}", serde_json::to_string_pretty(&request)?),
        None => println!("No pending continuation request for {}", agent.id),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn context(root: &Path) -> Context {
        let settings_path = root.join("conductor.toml");
        fs::write(
            &settings_path,
            format!(
                "[[agents]]\nid = \"fe\"\nrole = \"frontend\"\nstate_dir = \"{}\"\n",
                root.join("fe").display()
            ),
        )
        .unwrap();
        Context::load(Some(settings_path.as_path()), Some(root.join("COORDINATION.md"))).unwrap()
    }

    #[test]
    fn test_context_from_settings() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        assert_eq!(ctx.registry.len(), 1);
        assert_eq!(ctx.document, dir.path().join("COORDINATION.md"));
        assert!(ctx.agent("fe").is_ok());
        assert!(ctx.agent("nobody").is_err());
    }

    #[test]
    fn test_phase_and_task_commands() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());

        cmd_phase_init(
            &ctx,
            "p1",
            vec![TaskSpec {
                id: "P1-001".to_string(),
                role: conductor_models::AgentRole::Frontend,
                description: "Nav".to_string(),
            }],
        )
        .unwrap();
        cmd_task_set(&ctx, "P1-001", TaskStatus::Complete).unwrap();
        assert!(cmd_task_set(&ctx, "P1-404", TaskStatus::Complete).is_err());

        let doc = ctx.store().read().unwrap().unwrap();
        assert!(doc.phase.is_complete());
    }

    #[test]
    fn test_mark_rewrites_checklist() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        fs::create_dir_all(dir.path().join("fe")).unwrap();
        let path = dir.path().join("fe").join("task.md");
        fs::write(&path, "# UI\n- [ ] Nav\n- [ ] Footer\n").unwrap();

        cmd_mark(&ctx, "fe", 2, "done").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# UI\n- [ ] Nav\n- [x] Footer\n"
        );
        assert!(cmd_mark(&ctx, "fe", 7, "done").is_err());
        assert!(cmd_mark(&ctx, "fe", 0, "someday").is_err());
    }

    #[test]
    fn test_report_writes_file() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        fs::create_dir_all(dir.path().join("fe")).unwrap();
        fs::write(dir.path().join("fe").join("task.md"), "- [x] Nav\n").unwrap();

        let out = dir.path().join("reports");
        cmd_report(&ctx, Some("p9".to_string()), Some(out.clone()), false).unwrap();
        assert!(out.join("p9-report.md").exists());
    }
}
