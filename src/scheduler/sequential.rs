//! The Sequential strategy: one task at a time, no worktrees.

use std::time::{Duration, Instant};

use crate::agent::AgentRunner;
use crate::config::Config;
use crate::events::{Event, EventBus};
use crate::scheduler::hooks::Hooks;
use crate::scheduler::{SchedulerError, Strategy};
use crate::task::{ExecutionContext, ExecutionOptions, RunSummary, Task, TaskExecutionResult};

pub struct SequentialStrategy<'a> {
    pub agent: &'a dyn AgentRunner,
    pub config: &'a Config,
    pub events: &'a EventBus,
    pub hooks: &'a Hooks,
}

impl Strategy for SequentialStrategy<'_> {
    fn execute(&self, tasks: &[Task], ctx: &ExecutionContext) -> Result<RunSummary, SchedulerError> {
        let run_start = Instant::now();
        let mut results = Vec::with_capacity(tasks.len());

        self.hooks.call_execution_start();
        self.events.emit(Event::PipelineStart {
            run_id: ctx.run_id.clone(),
        });

        for task in tasks {
            if ctx.cancel.is_cancelled() {
                log::info!("run cancelled, stopping before task {}", task.task_id);
                break;
            }

            self.events.emit(Event::TaskStart {
                task_id: task.task_id.clone(),
            });
            self.hooks.call_task_start(&task.task_id);

            let result = if ctx.options.dry_run {
                TaskExecutionResult::success(task.task_id.clone(), Duration::ZERO)
            } else {
                self.execute_one(task, ctx)
            };

            if result.success {
                self.events.emit(Event::TaskComplete {
                    task_id: task.task_id.clone(),
                    success: true,
                });
                self.hooks.call_task_complete(&result);
            } else {
                let error = result.error.clone().unwrap_or_default();
                self.events.emit(Event::TaskError {
                    task_id: task.task_id.clone(),
                    error: error.clone(),
                });
                self.hooks.call_task_error(&task.task_id, &error);
            }

            let failed = !result.success;
            results.push(result);

            if ctx.options.fail_fast && failed {
                break;
            }
        }

        let summary = RunSummary::from_results(results, run_start.elapsed());
        self.events.emit(Event::PipelineComplete {
            run_id: ctx.run_id.clone(),
        });
        self.hooks.call_execution_complete(&summary);
        Ok(summary)
    }

    fn can_handle(&self, _tasks: &[Task], options: &ExecutionOptions) -> bool {
        !options.parallel || !options.branch_per_task
    }

    fn estimate_duration(&self, tasks: &[Task]) -> Duration {
        tasks.len() as u32 * Duration::from_secs(60)
    }
}

impl SequentialStrategy<'_> {
    fn execute_one(&self, task: &Task, ctx: &ExecutionContext) -> TaskExecutionResult {
        let t0 = Instant::now();
        let prompt = match self.config.render_prompt(task, &ctx.options) {
            Ok(p) => p,
            Err(e) => return TaskExecutionResult::failure(task.task_id.clone(), t0.elapsed(), e.to_string()),
        };

        self.events.emit(Event::EngineStart {
            task_id: task.task_id.clone(),
        });
        let agent_result = self.agent.execute(&prompt, &ctx.work_dir, &task.task_id, &ctx.cancel);

        if agent_result.success {
            self.events.emit(Event::EngineComplete {
                task_id: task.task_id.clone(),
            });
            let mut result = TaskExecutionResult::success(task.task_id.clone(), t0.elapsed());
            result.input_tokens = None;
            result.output_tokens = None;
            result
        } else {
            let error = agent_result.error.unwrap_or_else(|| "agent failed".to_string());
            self.events.emit(Event::EngineError {
                task_id: task.task_id.clone(),
                error: error.clone(),
            });
            TaskExecutionResult::failure(task.task_id.clone(), t0.elapsed(), error)
        }
    }
}
