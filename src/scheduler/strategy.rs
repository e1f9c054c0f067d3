//! Strategy trait and the pipeline-aware selection policy.

use std::time::Duration;

use crate::scheduler::SchedulerError;
use crate::task::{ExecutionContext, RunSummary, Task};

pub trait Strategy {
    fn execute(&self, tasks: &[Task], ctx: &ExecutionContext) -> Result<RunSummary, SchedulerError>;
    fn can_handle(&self, tasks: &[Task], options: &crate::task::ExecutionOptions) -> bool;
    fn estimate_duration(&self, tasks: &[Task]) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StrategyKind {
    Sequential,
    ParallelWorktree,
}

/// The outcome of [`select_strategy`]: which strategy, and why, for the
/// decision to be logged with its rationale.
#[derive(Debug, Clone)]
pub struct StrategyDecision {
    pub kind: StrategyKind,
    pub rationale: String,
}

/// The seven-step decision tree, evaluated in order.
pub fn select_strategy(tasks: &[Task], options: &crate::task::ExecutionOptions) -> StrategyDecision {
    if !options.parallel {
        return StrategyDecision {
            kind: StrategyKind::Sequential,
            rationale: "parallel=false".to_string(),
        };
    }
    if !options.branch_per_task {
        return StrategyDecision {
            kind: StrategyKind::Sequential,
            rationale: "branchPerTask=false".to_string(),
        };
    }
    if tasks.iter().any(|t| t.metadata.parallel_group.is_some()) {
        return StrategyDecision {
            kind: StrategyKind::ParallelWorktree,
            rationale: "at least one task has an explicit parallelGroup".to_string(),
        };
    }
    let independent_count = tasks.iter().filter(|t| !t.has_dependencies()).count();
    if independent_count > 1 {
        return StrategyDecision {
            kind: StrategyKind::ParallelWorktree,
            rationale: format!("{independent_count} tasks have no dependencies"),
        };
    }
    if tasks.iter().all(|t| t.has_dependencies()) {
        return StrategyDecision {
            kind: StrategyKind::Sequential,
            rationale: "every task has dependencies".to_string(),
        };
    }
    if tasks.len() == 1 {
        return StrategyDecision {
            kind: StrategyKind::Sequential,
            rationale: "exactly one task".to_string(),
        };
    }
    StrategyDecision {
        kind: StrategyKind::ParallelWorktree,
        rationale: "fallback: parallel and branchPerTask both set, no simpler rule matched".to_string(),
    }
}
