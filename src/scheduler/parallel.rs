//! The ParallelWorktree strategy: one worktree and branch per task,
//! grouped waves bounded by a thread pool.
//!
//! Grouping and bounded concurrency follow the "flat parallelism" pattern
//! in `worktrunk::commands::list::collect::collect`: a `rayon::scope` fans
//! a wave's tasks out onto a `rayon::ThreadPool` capped at `maxWorkers`,
//! and the scope itself is the wave barrier — it does not return until
//! every task in the wave has terminated. Worker closures relay lifecycle
//! events over a `crossbeam_channel` rather than calling hooks directly,
//! so a slow subscriber cannot stall a wave; the orchestrating thread
//! drains the channel and dispatches once the scope completes.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::agent::AgentRunner;
use crate::config::Config;
use crate::events::{Event, EventBus};
use crate::git::Repository;
use crate::merge::{MergeOutcome, safe_merge_in_worktree};
use crate::scheduler::hooks::Hooks;
use crate::scheduler::{SchedulerError, Strategy};
use crate::task::{ExecutionContext, ExecutionOptions, RunSummary, Task, TaskExecutionResult};
use crate::worktree::WorktreeService;

enum LifecycleMessage {
    TaskStart { task_id: String },
    WorktreeCreate { task_id: String, path: PathBuf, branch: String },
    EngineStart { task_id: String },
    EngineComplete { task_id: String },
    EngineError { task_id: String, error: String },
    TaskComplete { result: TaskExecutionResult },
    TaskError { task_id: String, error: String },
}

pub struct ParallelWorktreeStrategy<'a> {
    pub agent: &'a dyn AgentRunner,
    pub config: &'a Config,
    pub events: &'a EventBus,
    pub hooks: &'a Hooks,
    pub repo: &'a Repository,
}

/// What a single task contributed to its wave, carried forward into the
/// merge/cleanup phase.
struct TaskOutcome {
    result: TaskExecutionResult,
    worktree_path: Option<PathBuf>,
    branch: Option<String>,
}

impl Strategy for ParallelWorktreeStrategy<'_> {
    fn execute(&self, tasks: &[Task], ctx: &ExecutionContext) -> Result<RunSummary, SchedulerError> {
        let run_start = Instant::now();

        self.hooks.call_execution_start();
        self.events.emit(Event::PipelineStart {
            run_id: ctx.run_id.clone(),
        });

        let mut groups: Vec<u32> = tasks.iter().map(Task::parallel_group).collect();
        groups.sort_unstable();
        groups.dedup();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.options.max_workers.max(1) as usize)
            .build()
            .map_err(|e| {
                self.events.emit(Event::PipelinePhaseError {
                    run_id: ctx.run_id.clone(),
                    phase: "pool-init".to_string(),
                    error: e.to_string(),
                });
                SchedulerError::Git(crate::git::GitError::ParseError(e.to_string()))
            })?;

        let mut all_results = Vec::new();
        let mut stop = false;

        for group in groups {
            if stop {
                break;
            }
            if ctx.cancel.is_cancelled() {
                log::info!("run cancelled, stopping before group {group}");
                break;
            }
            self.hooks.call_group_start(group);

            let group_tasks: Vec<&Task> = tasks.iter().filter(|t| t.parallel_group() == group).collect();
            let phase = format!("group-{group}-execute");
            self.emit_phase_start(ctx, &phase);
            let outcomes = self.run_group(&pool, &group_tasks, ctx);
            self.emit_phase_complete(ctx, &phase);

            if !ctx.options.skip_merge {
                let phase = format!("group-{group}-merge");
                self.emit_phase_start(ctx, &phase);
                self.merge_group(&outcomes, ctx);
                self.emit_phase_complete(ctx, &phase);
            }

            let phase = format!("group-{group}-cleanup");
            self.emit_phase_start(ctx, &phase);
            self.cleanup_group(&outcomes);
            self.emit_phase_complete(ctx, &phase);

            let group_failed = outcomes.iter().any(|o| !o.result.success);
            all_results.extend(outcomes.into_iter().map(|o| o.result));

            self.hooks.call_group_complete(group);

            if ctx.options.fail_fast && group_failed {
                stop = true;
            }
        }

        let summary = RunSummary::from_results(all_results, run_start.elapsed());
        self.events.emit(Event::PipelineComplete {
            run_id: ctx.run_id.clone(),
        });
        self.hooks.call_execution_complete(&summary);
        Ok(summary)
    }

    fn can_handle(&self, tasks: &[Task], options: &ExecutionOptions) -> bool {
        options.parallel && options.branch_per_task && tasks.len() > 1
    }

    fn estimate_duration(&self, tasks: &[Task]) -> Duration {
        let mut groups: Vec<u32> = tasks.iter().map(Task::parallel_group).collect();
        groups.sort_unstable();
        groups.dedup();
        groups.len() as u32 * Duration::from_secs(10 * 60)
    }
}

impl ParallelWorktreeStrategy<'_> {
    /// Thin wrapper around the run/merge/cleanup phase boundary of a single
    /// group — no separate phase state machine, just `Event::PipelinePhase*`
    /// bracketing the work already done by `run_group`/`merge_group`/
    /// `cleanup_group`.
    fn emit_phase_start(&self, ctx: &ExecutionContext, phase: &str) {
        self.events.emit(Event::PipelinePhaseStart {
            run_id: ctx.run_id.clone(),
            phase: phase.to_string(),
        });
    }

    fn emit_phase_complete(&self, ctx: &ExecutionContext, phase: &str) {
        self.events.emit(Event::PipelinePhaseComplete {
            run_id: ctx.run_id.clone(),
            phase: phase.to_string(),
        });
    }

    /// Run every task in `group_tasks` concurrently, bounded by the pool's
    /// thread count, and return once all have terminated (the group
    /// barrier).
    fn run_group(&self, pool: &rayon::ThreadPool, group_tasks: &[&Task], ctx: &ExecutionContext) -> Vec<TaskOutcome> {
        let (tx, rx): (Sender<LifecycleMessage>, Receiver<LifecycleMessage>) = unbounded();
        let worktree_svc = WorktreeService::new(self.repo);
        let outcomes: Mutex<Vec<TaskOutcome>> = Mutex::new(Vec::with_capacity(group_tasks.len()));

        pool.scope(|scope| {
            for task in group_tasks {
                let tx = tx.clone();
                let worktree_svc = &worktree_svc;
                let outcomes = &outcomes;
                scope.spawn(move |_| {
                    let outcome = self.run_one_task(task, ctx, worktree_svc, &tx);
                    outcomes.lock().expect("outcomes mutex poisoned").push(outcome);
                });
            }
        });

        drop(tx);
        for message in rx.try_iter() {
            self.dispatch(message);
        }

        outcomes.into_inner().expect("outcomes mutex poisoned")
    }

    fn run_one_task(
        &self,
        task: &Task,
        ctx: &ExecutionContext,
        worktree_svc: &WorktreeService,
        tx: &Sender<LifecycleMessage>,
    ) -> TaskOutcome {
        let t0 = Instant::now();
        let _ = tx.send(LifecycleMessage::TaskStart {
            task_id: task.task_id.clone(),
        });

        let created = worktree_svc.create_worktree(task, None, &ctx.options.base_branch, &ctx.run_id, &ctx.work_dir);
        let created = match created {
            Ok(c) => c,
            Err(e) => {
                let error = e.to_string();
                let result = TaskExecutionResult::failure(task.task_id.clone(), t0.elapsed(), error.clone());
                let _ = tx.send(LifecycleMessage::TaskError {
                    task_id: task.task_id.clone(),
                    error,
                });
                return TaskOutcome {
                    result,
                    worktree_path: None,
                    branch: None,
                };
            }
        };

        let _ = tx.send(LifecycleMessage::WorktreeCreate {
            task_id: task.task_id.clone(),
            path: created.worktree_path.clone(),
            branch: created.branch_name.clone(),
        });

        let prompt = self
            .config
            .render_prompt(task, &ctx.options)
            .unwrap_or_else(|_| task.title.clone());

        let _ = tx.send(LifecycleMessage::EngineStart {
            task_id: task.task_id.clone(),
        });
        let agent_result = if ctx.options.dry_run {
            crate::agent::AgentResult {
                success: true,
                output: "dry run".to_string(),
                steps: Vec::new(),
                duration: Duration::ZERO,
                exit_code: Some(0),
                error: None,
            }
        } else {
            self.agent
                .execute(&prompt, &created.worktree_path, &task.task_id, &ctx.cancel)
        };

        if agent_result.success {
            let _ = tx.send(LifecycleMessage::EngineComplete {
                task_id: task.task_id.clone(),
            });
        } else {
            let _ = tx.send(LifecycleMessage::EngineError {
                task_id: task.task_id.clone(),
                error: agent_result.error.clone().unwrap_or_else(|| "agent failed".to_string()),
            });
        }

        let mut result = if agent_result.success {
            let mut r = TaskExecutionResult::success(task.task_id.clone(), t0.elapsed());
            r.branch = Some(created.branch_name.clone());
            r.worktree = Some(created.worktree_path.clone());
            r
        } else {
            let mut r = TaskExecutionResult::failure(
                task.task_id.clone(),
                t0.elapsed(),
                agent_result.error.clone().unwrap_or_else(|| "agent failed".to_string()),
            );
            r.branch = Some(created.branch_name.clone());
            r.worktree = Some(created.worktree_path.clone());
            r
        };
        result.duration = t0.elapsed();

        if result.success {
            let _ = tx.send(LifecycleMessage::TaskComplete { result: result.clone() });
        } else {
            let _ = tx.send(LifecycleMessage::TaskError {
                task_id: task.task_id.clone(),
                error: result.error.clone().unwrap_or_default(),
            });
        }

        TaskOutcome {
            result,
            worktree_path: Some(created.worktree_path),
            branch: Some(created.branch_name),
        }
    }

    fn dispatch(&self, message: LifecycleMessage) {
        match message {
            LifecycleMessage::TaskStart { task_id } => {
                self.events.emit(Event::TaskStart { task_id: task_id.clone() });
                self.hooks.call_task_start(&task_id);
            }
            LifecycleMessage::WorktreeCreate { task_id, path, branch } => {
                self.events.emit(Event::GitWorktreeCreate {
                    task_id: task_id.clone(),
                    path: path.display().to_string(),
                    branch: branch.clone(),
                });
                self.events.emit(Event::GitBranchCreate { branch: branch.clone() });
                self.hooks.call_worktree_create(&task_id, &path, &branch);
            }
            LifecycleMessage::EngineStart { task_id } => {
                self.events.emit(Event::EngineStart { task_id });
            }
            LifecycleMessage::EngineComplete { task_id } => {
                self.events.emit(Event::EngineComplete { task_id });
            }
            LifecycleMessage::EngineError { task_id, error } => {
                self.events.emit(Event::EngineError { task_id, error });
            }
            LifecycleMessage::TaskComplete { result } => {
                self.events.emit(Event::TaskComplete {
                    task_id: result.task_id.clone(),
                    success: true,
                });
                self.hooks.call_task_complete(&result);
            }
            LifecycleMessage::TaskError { task_id, error } => {
                self.events.emit(Event::TaskError {
                    task_id: task_id.clone(),
                    error: error.clone(),
                });
                self.hooks.call_task_error(&task_id, &error);
            }
        }
    }

    /// Merge every successful branch from this wave into the base branch,
    /// using the safe-in-worktree path so the operator's own checkout is
    /// never disturbed. Deletes each branch locally after a successful
    /// merge; conflicts are left for the caller, never retried here.
    fn merge_group(&self, outcomes: &[TaskOutcome], ctx: &ExecutionContext) {
        for outcome in outcomes {
            if !outcome.result.success {
                continue;
            }
            let Some(branch) = &outcome.branch else { continue };

            self.hooks.call_merge_start(branch, &ctx.options.base_branch);
            match safe_merge_in_worktree(self.repo, &ctx.work_dir, &ctx.run_id, branch, &ctx.options.base_branch) {
                Ok(MergeOutcome::Merged { .. }) => {
                    self.hooks.call_merge_complete(branch, &ctx.options.base_branch);
                    if let Err(e) = self.repo.delete_local_branch(branch, false) {
                        log::warn!("failed to delete merged branch {branch}: {e}");
                    }
                }
                Ok(MergeOutcome::Conflicted { conflicted_files }) => {
                    self.hooks.call_merge_conflict(branch, &conflicted_files);
                }
                Err(e) => {
                    log::warn!("merge of {branch} into {} failed: {e}", ctx.options.base_branch);
                }
            }
        }
    }

    /// Remove every worktree produced by the wave, after merges for that
    /// wave have been attempted: a branch checked out in a worktree is
    /// locked against merge, so cleanup must come last.
    fn cleanup_group(&self, outcomes: &[TaskOutcome]) {
        let worktree_svc = WorktreeService::new(self.repo);
        for outcome in outcomes {
            let Some(path) = &outcome.worktree_path else { continue };
            match worktree_svc.cleanup_worktree(path, false) {
                Ok(result) => {
                    if result.left_in_place {
                        log::warn!(
                            "leaving worktree in place for task {}: {}",
                            outcome.result.task_id,
                            result.reason.clone().unwrap_or_default()
                        );
                    }
                    self.hooks
                        .call_worktree_cleanup(&outcome.result.task_id, path, result.left_in_place);
                }
                Err(e) => log::warn!("failed to clean up worktree {}: {e}", path.display()),
            }
        }
    }
}
