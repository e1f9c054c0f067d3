//! Command-line surface: `milhouse run <tasks.json>`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "milhouse")]
#[command(about = "Scheduling, worktree, and merge engine for parallel AI coding agents")]
#[command(version)]
pub struct Cli {
    /// Show command traces and scheduling rationale
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a batch of tasks against a git repository
    Run {
        /// Path to a JSON file holding `{ "tasks": [...], "options": {...} }`
        tasks_file: PathBuf,

        /// Repository to operate on (defaults to the current directory)
        #[arg(short = 'C', long)]
        work_dir: Option<PathBuf>,

        /// Agent command to shell out to for each task (e.g. "claude -p")
        #[arg(long)]
        agent_command: Option<String>,

        /// Print the chosen strategy and planned actions without running agents
        #[arg(long)]
        dry_run: bool,
    },
}
