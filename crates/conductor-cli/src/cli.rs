//! Command-line interface definition using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use conductor_models::{AgentRole, PhaseStatus, TaskStatus};

/// Version with git hash and build date, e.g. `0.1.0 (abc1234, 2026-10-16)`.
fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const BUILD_DATE: &str = env!("BUILD_DATE");

    static VERSION_STRING: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} ({}, {})", VERSION, GIT_HASH, BUILD_DATE))
}

/// Conductor - phase coordinator for teams of autonomous agents
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version = version_string(), about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file
    #[arg(short, long, env = "CONDUCTOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Coordination document (overrides the settings file)
    #[arg(short, long, global = true)]
    pub document: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the coordinator until interrupted
    Watch {
        /// Run a single poll and phase check, then exit
        #[arg(long)]
        once: bool,
    },

    /// Show every agent's checklist progress
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Build the combined phase report
    Report {
        /// Phase id (defaults to the current phase)
        #[arg(short, long)]
        phase: Option<String>,

        /// Output directory (defaults to the reports directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Send the current phase to the reviewer now
    Review,

    /// Manage the current phase
    Phase {
        #[command(subcommand)]
        action: PhaseCommand,
    },

    /// Manage phase tasks
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Rewrite one item of an agent's checklist
    Mark {
        /// Agent id
        agent: String,

        /// Zero-based line number of the item
        position: usize,

        /// New status: pending, in_progress, completed
        status: String,
    },

    /// Print and remove an agent's pending continuation request
    Consume {
        /// Agent id
        agent: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PhaseCommand {
    /// Start a new phase, archiving the previous one
    Init {
        /// Phase id
        id: String,

        /// Tasks as ID:ROLE:DESCRIPTION
        #[arg(short, long = "task", value_parser = parse_task_spec)]
        tasks: Vec<TaskSpec>,
    },

    /// Show the current phase
    Show {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Set the phase status
    Set {
        status: PhaseStatus,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add or replace a task in the current phase
    Add {
        id: String,
        role: AgentRole,
        description: String,

        /// Task ids this task depends on
        #[arg(long = "after")]
        depends_on: Vec<String>,
    },

    /// Transition a task
    Set {
        id: String,
        status: TaskStatus,
    },
}

/// A task given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: String,
    pub role: AgentRole,
    pub description: String,
}

/// Parses `ID:ROLE:DESCRIPTION`.
pub fn parse_task_spec(s: &str) -> Result<TaskSpec, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(id), Some(role), Some(description)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected ID:ROLE:DESCRIPTION, got '{}'", s));
    };
    if id.trim().is_empty() || description.trim().is_empty() {
        return Err(format!("empty id or description in '{}'", s));
    }
    Ok(TaskSpec {
        id: id.trim().to_string(),
        role: role.parse()?,
        description: description.trim().to_string(),
    })
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Cli {
    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
