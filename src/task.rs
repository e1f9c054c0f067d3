//! The task data model: the immutable input to a run and the results a
//! scheduler accumulates from it.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Free-form bookkeeping carried alongside a task. `parallel_group` is the
/// field the scheduler actually reads; the rest exists for upstream
/// tooling to round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub source: Option<String>,
    #[serde(default)]
    pub dependencies: HashSet<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub parallel_group: Option<u32>,
}

/// One unit of work handed to the orchestrator. Treated as immutable once
/// a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

impl Task {
    pub fn parallel_group(&self) -> u32 {
        self.metadata.parallel_group.unwrap_or(0)
    }

    pub fn has_dependencies(&self) -> bool {
        !self.metadata.dependencies.is_empty()
    }
}

/// Caller-supplied knobs for a run. Every field has a spec-mandated
/// default so a caller can construct `ExecutionOptions::default()` and
/// override only what matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub parallel: bool,
    pub branch_per_task: bool,
    pub max_workers: u32,
    pub base_branch: String,
    pub dry_run: bool,
    pub skip_tests: bool,
    pub skip_lint: bool,
    pub fail_fast: bool,
    pub skip_merge: bool,
    #[serde(with = "humantime_serde_duration")]
    pub task_timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "humantime_serde_duration")]
    pub retry_delay: Duration,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            branch_per_task: false,
            max_workers: 4,
            base_branch: "main".to_string(),
            dry_run: false,
            skip_tests: false,
            skip_lint: false,
            fail_fast: false,
            skip_merge: false,
            task_timeout: Duration::from_secs(66 * 60),
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
        }
    }
}

mod humantime_serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// The per-run immutable record passed to a strategy.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub work_dir: std::path::PathBuf,
    pub engine: String,
    pub options: ExecutionOptions,
    pub metadata: Option<HashMap<String, String>>,
    /// Set by the caller (or `scheduler::run`'s caller) to cancel a run in
    /// flight; checked between waves/tasks and forwarded into every agent
    /// invocation.
    pub cancel: CancellationToken,
}

/// The result of executing a single task, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionResult {
    pub task_id: String,
    pub success: bool,
    pub branch: Option<String>,
    pub worktree: Option<std::path::PathBuf>,
    pub duration: Duration,
    pub error: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl TaskExecutionResult {
    pub fn success(task_id: impl Into<String>, duration: Duration) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            branch: None,
            worktree: None,
            duration,
            error: None,
            input_tokens: None,
            output_tokens: None,
        }
    }

    pub fn failure(task_id: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            branch: None,
            worktree: None,
            duration,
            error: Some(error.into()),
            input_tokens: None,
            output_tokens: None,
        }
    }
}

/// The aggregate result of a whole run, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub tasks_executed: u32,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
    pub total_duration: Duration,
    pub all_succeeded: bool,
    pub results: Vec<TaskExecutionResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<TaskExecutionResult>, total_duration: Duration) -> Self {
        let tasks_executed = results.len() as u32;
        let tasks_completed = results.iter().filter(|r| r.success).count() as u32;
        let tasks_failed = tasks_executed - tasks_completed;
        Self {
            tasks_executed,
            tasks_completed,
            tasks_failed,
            total_duration,
            all_succeeded: tasks_failed == 0,
            results,
        }
    }
}
