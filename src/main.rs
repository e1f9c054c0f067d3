use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use milhouse::agent::{AgentRunner, DryRunAgentRunner, ProcessAgentRunner};
use milhouse::cancellation::CancellationToken;
use milhouse::config::Config;
use milhouse::events::EventBus;
use milhouse::git::Repository;
use milhouse::scheduler::{self, Hooks};
use milhouse::task::{ExecutionContext, ExecutionOptions, Task};

mod cli;

use cli::{Cli, Commands};

#[derive(serde::Deserialize)]
struct TaskBatch {
    tasks: Vec<Task>,
    #[serde(default)]
    options: Option<ExecutionOptions>,
    #[serde(default)]
    run_id: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let result = match cli.command {
        Commands::Run {
            tasks_file,
            work_dir,
            agent_command,
            dry_run,
        } => run_batch(tasks_file, work_dir, agent_command, dry_run),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run_batch(
    tasks_file: PathBuf,
    work_dir: Option<PathBuf>,
    agent_command: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let work_dir = work_dir
        .map(Ok)
        .unwrap_or_else(|| std::env::current_dir())?;

    let raw = std::fs::read_to_string(&tasks_file)?;
    let batch = parse_task_batch(&tasks_file, &raw)?;

    let mut options = batch.options.unwrap_or_default();
    if dry_run {
        options.dry_run = true;
    }

    let run_id = batch.run_id.unwrap_or_else(|| "run-local".to_string());
    let started_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    log::info!("run {run_id} starting at {started_at} ({} tasks)", batch.tasks.len());

    let repo = Repository::at(&work_dir)?;
    let config = Config::load(&work_dir)?;
    let events = EventBus::new();
    events.subscribe(|event| log::debug!("event: {event:?}"));
    let hooks = build_logging_hooks();

    let dry_run_agent = DryRunAgentRunner;
    let process_agent;
    let agent: &dyn AgentRunner = if options.dry_run {
        &dry_run_agent
    } else {
        let mut parts = agent_command
            .as_deref()
            .unwrap_or("true")
            .split_whitespace();
        let command = parts.next().unwrap_or("true").to_string();
        let args: Vec<String> = parts.map(str::to_string).collect();

        // `which` resolves the same way the shell's own PATH lookup would,
        // so a typo in --agent-command is reported before any worktree is
        // created rather than surfacing as a same-looking per-task failure.
        let resolved = which::which(&command)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| command.clone());
        log::debug!("agent command resolved to {resolved}");

        process_agent = ProcessAgentRunner::new(command, args, Some(options.task_timeout));
        &process_agent
    };

    let cancel = CancellationToken::new();
    #[cfg(unix)]
    {
        if let Err(e) = cancel.register_signal(signal_hook::consts::SIGINT) {
            log::warn!("failed to install SIGINT handler: {e}");
        }
        if let Err(e) = cancel.register_signal(signal_hook::consts::SIGTERM) {
            log::warn!("failed to install SIGTERM handler: {e}");
        }
    }

    let ctx = ExecutionContext {
        run_id,
        work_dir,
        engine: agent_command.unwrap_or_else(|| "dry-run".to_string()),
        options,
        metadata: None,
        cancel,
    };

    let summary = scheduler::run(&batch.tasks, &ctx, agent, &config, &events, &hooks, &repo)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let line = format!(
        "{} executed, {} completed, {} failed, {:.1}s total",
        summary.tasks_executed,
        summary.tasks_completed,
        summary.tasks_failed,
        duration_secs(summary.total_duration),
    );
    let style = if summary.all_succeeded { milhouse::styling::SUCCESS } else { milhouse::styling::FAILURE };
    milhouse::styling::println!("{}", milhouse::styling::paint(style, &line));

    if !summary.all_succeeded {
        process::exit(1);
    }

    Ok(())
}

/// `.toml` files parse as TOML, everything else (including no extension)
/// as JSON — matching the two formats the task-batch file accepts.
fn parse_task_batch(path: &PathBuf, raw: &str) -> anyhow::Result<TaskBatch> {
    let is_toml = path.extension().and_then(|ext| ext.to_str()) == Some("toml");
    if is_toml {
        Ok(toml::from_str(raw)?)
    } else {
        Ok(serde_json::from_str(raw)?)
    }
}

fn duration_secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

fn build_logging_hooks() -> Hooks {
    Hooks {
        on_task_start: Some(Box::new(|task_id: &str| {
            log::info!("task {task_id} starting");
        })),
        on_task_complete: Some(Box::new(|result: &milhouse::task::TaskExecutionResult| {
            log::info!("task {} completed in {:?}", result.task_id, result.duration);
        })),
        on_task_error: Some(Box::new(|task_id: &str, error: &str| {
            log::warn!("task {task_id} failed: {error}");
        })),
        on_merge_conflict: Some(Box::new(|branch: &str, files: &[String]| {
            log::warn!("merge conflict on {branch}: {}", files.join(", "));
        })),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_task_batch() {
        let raw = r#"{"tasks": [{"task_id": "t1", "title": "Fix login"}]}"#;
        let batch = parse_task_batch(&PathBuf::from("tasks.json"), raw).unwrap();
        assert_eq!(batch.tasks.len(), 1);
        assert_eq!(batch.tasks[0].task_id, "t1");
    }

    #[test]
    fn parses_toml_task_batch() {
        let raw = "run_id = \"run-1\"\n\n[[tasks]]\ntask_id = \"t1\"\ntitle = \"Fix login\"\n";
        let batch = parse_task_batch(&PathBuf::from("tasks.toml"), raw).unwrap();
        assert_eq!(batch.run_id.as_deref(), Some("run-1"));
        assert_eq!(batch.tasks.len(), 1);
        assert_eq!(batch.tasks[0].title, "Fix login");
    }
}
