//! The task scheduler: strategy selection and dispatch.

pub mod error;
pub mod hooks;
pub mod parallel;
pub mod sequential;
pub mod strategy;

pub use error::SchedulerError;
pub use hooks::Hooks;
pub use parallel::ParallelWorktreeStrategy;
pub use sequential::SequentialStrategy;
pub use strategy::{Strategy, StrategyDecision, StrategyKind, select_strategy};

use crate::agent::AgentRunner;
use crate::config::Config;
use crate::events::EventBus;
use crate::git::Repository;
use crate::task::{ExecutionContext, RunSummary, Task};

/// Pick a strategy via [`select_strategy`] and run it, logging the
/// rationale before execution begins.
pub fn run(
    tasks: &[Task],
    ctx: &ExecutionContext,
    agent: &dyn AgentRunner,
    config: &Config,
    events: &EventBus,
    hooks: &Hooks,
    repo: &Repository,
) -> Result<RunSummary, SchedulerError> {
    if tasks.is_empty() {
        return Err(SchedulerError::NoTasks);
    }

    let decision = select_strategy(tasks, &ctx.options);
    log::info!("selected {} strategy: {}", decision.kind, decision.rationale);

    match decision.kind {
        StrategyKind::Sequential => {
            let strategy = SequentialStrategy {
                agent,
                config,
                events,
                hooks,
            };
            strategy.execute(tasks, ctx)
        }
        StrategyKind::ParallelWorktree => {
            let strategy = ParallelWorktreeStrategy {
                agent,
                config,
                events,
                hooks,
                repo,
            };
            strategy.execute(tasks, ctx)
        }
    }
}
