//! The agent interface: the contract an AI coding agent is run under.
//!
//! The core treats the agent as opaque and never parses its output. Two
//! implementations are provided: [`ProcessAgentRunner`], which shells out
//! to a configured command the way `worktrunk::shell_exec` detects and
//! invokes a platform shell, and [`DryRunAgentRunner`], which completes
//! instantly with a synthetic success for `dryRun` mode and tests (S1).

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::cancellation::CancellationToken;
use crate::command::CommandExecutor;

/// One step an agent reports having taken. Opaque to the core beyond
/// counting/logging.
#[derive(Debug, Clone)]
pub struct AgentStep {
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AgentResult {
    pub success: bool,
    pub output: String,
    pub steps: Vec<AgentStep>,
    pub duration: Duration,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// `Execute({prompt, workDir, taskId}) -> AgentResult`. `cancel` is
/// polled by implementations that spawn a long-running child process,
/// which may exit early with `success: false` if it fires mid-run.
pub trait AgentRunner: Send + Sync {
    fn execute(&self, prompt: &str, work_dir: &Path, task_id: &str, cancel: &CancellationToken) -> AgentResult;
}

/// Shells out to a configured command, piping the prompt on stdin and
/// treating the process's stdout/exit code as the agent's report.
pub struct ProcessAgentRunner {
    executor: CommandExecutor,
    command: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessAgentRunner {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            executor: CommandExecutor::new(),
            command: command.into(),
            args,
            timeout,
        }
    }
}

impl AgentRunner for ProcessAgentRunner {
    fn execute(&self, prompt: &str, work_dir: &Path, task_id: &str, cancel: &CancellationToken) -> AgentResult {
        let t0 = Instant::now();
        let mut env = HashMap::new();
        env.insert("MILHOUSE_TASK_ID".to_string(), task_id.to_string());
        env.insert("MILHOUSE_PROMPT".to_string(), prompt.to_string());

        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        match self
            .executor
            .run_cancellable(&self.command, &args, work_dir, &env, self.timeout, Some(cancel))
        {
            Ok(output) => AgentResult {
                success: output.success(),
                output: output.stdout,
                steps: Vec::new(),
                duration: t0.elapsed(),
                exit_code: output.exit_code,
                error: if output.success() {
                    None
                } else if output.cancelled {
                    Some("agent process cancelled".to_string())
                } else if output.timed_out {
                    Some("agent process timed out".to_string())
                } else {
                    Some(output.stderr)
                },
            },
            Err(e) => AgentResult {
                success: false,
                output: String::new(),
                steps: Vec::new(),
                duration: t0.elapsed(),
                exit_code: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Completes instantly with a synthetic success. Used for `dryRun` mode
/// and in tests that exercise scheduling without spawning real agents.
#[derive(Debug, Clone, Default)]
pub struct DryRunAgentRunner;

impl AgentRunner for DryRunAgentRunner {
    fn execute(&self, _prompt: &str, _work_dir: &Path, _task_id: &str, _cancel: &CancellationToken) -> AgentResult {
        AgentResult {
            success: true,
            output: "dry run: no changes made".to_string(),
            steps: Vec::new(),
            duration: Duration::ZERO,
            exit_code: Some(0),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_runner_is_instant_success() {
        let runner = DryRunAgentRunner;
        let result = runner.execute("do something", Path::new("."), "t1", &CancellationToken::new());
        assert!(result.success);
        assert_eq!(result.duration, Duration::ZERO);
    }

    #[test]
    fn process_runner_reports_nonzero_exit_as_failure() {
        let runner = ProcessAgentRunner::new("sh", vec!["-c".to_string(), "exit 3".to_string()], None);
        let result = runner.execute("prompt", Path::new("."), "t1", &CancellationToken::new());
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn process_runner_honors_cancellation() {
        let runner = ProcessAgentRunner::new("sh", vec!["-c".to_string(), "sleep 5".to_string()], None);
        let token = CancellationToken::new();
        token.cancel();
        let result = runner.execute("prompt", Path::new("."), "t1", &token);
        assert!(!result.success);
    }
}
