//! Lifecycle hooks: a fixed struct of optional callbacks.
//!
//! Every field is optional and every invocation is logged on error rather
//! than propagated — a misbehaving subscriber must never fail a run.

use std::path::Path;

use crate::task::{RunSummary, TaskExecutionResult};

#[derive(Default)]
pub struct Hooks {
    pub on_execution_start: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_task_start: Option<Box<dyn Fn(&str) + Send + Sync>>,
    pub on_task_complete: Option<Box<dyn Fn(&TaskExecutionResult) + Send + Sync>>,
    pub on_task_error: Option<Box<dyn Fn(&str, &str) + Send + Sync>>,
    pub on_group_start: Option<Box<dyn Fn(u32) + Send + Sync>>,
    pub on_group_complete: Option<Box<dyn Fn(u32) + Send + Sync>>,
    pub on_worktree_create: Option<Box<dyn Fn(&str, &Path, &str) + Send + Sync>>,
    pub on_worktree_cleanup: Option<Box<dyn Fn(&str, &Path, bool) + Send + Sync>>,
    pub on_merge_start: Option<Box<dyn Fn(&str, &str) + Send + Sync>>,
    pub on_merge_complete: Option<Box<dyn Fn(&str, &str) + Send + Sync>>,
    pub on_merge_conflict: Option<Box<dyn Fn(&str, &[String]) + Send + Sync>>,
    pub on_execution_complete: Option<Box<dyn Fn(&RunSummary) + Send + Sync>>,
}

impl Hooks {
    pub fn call_execution_start(&self) {
        if let Some(hook) = &self.on_execution_start {
            guard(|| hook());
        }
    }

    pub fn call_task_start(&self, task_id: &str) {
        if let Some(hook) = &self.on_task_start {
            guard(|| hook(task_id));
        }
    }

    pub fn call_task_complete(&self, result: &TaskExecutionResult) {
        if let Some(hook) = &self.on_task_complete {
            guard(|| hook(result));
        }
    }

    pub fn call_task_error(&self, task_id: &str, error: &str) {
        if let Some(hook) = &self.on_task_error {
            guard(|| hook(task_id, error));
        }
    }

    pub fn call_group_start(&self, group: u32) {
        if let Some(hook) = &self.on_group_start {
            guard(|| hook(group));
        }
    }

    pub fn call_group_complete(&self, group: u32) {
        if let Some(hook) = &self.on_group_complete {
            guard(|| hook(group));
        }
    }

    pub fn call_worktree_create(&self, task_id: &str, path: &Path, branch: &str) {
        if let Some(hook) = &self.on_worktree_create {
            guard(|| hook(task_id, path, branch));
        }
    }

    pub fn call_worktree_cleanup(&self, task_id: &str, path: &Path, left_in_place: bool) {
        if let Some(hook) = &self.on_worktree_cleanup {
            guard(|| hook(task_id, path, left_in_place));
        }
    }

    pub fn call_merge_start(&self, source: &str, target: &str) {
        if let Some(hook) = &self.on_merge_start {
            guard(|| hook(source, target));
        }
    }

    pub fn call_merge_complete(&self, source: &str, target: &str) {
        if let Some(hook) = &self.on_merge_complete {
            guard(|| hook(source, target));
        }
    }

    pub fn call_merge_conflict(&self, branch: &str, files: &[String]) {
        if let Some(hook) = &self.on_merge_conflict {
            guard(|| hook(branch, files));
        }
    }

    pub fn call_execution_complete(&self, summary: &RunSummary) {
        if let Some(hook) = &self.on_execution_complete {
            guard(|| hook(summary));
        }
    }
}

fn guard(f: impl FnOnce()) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let message = e
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| e.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic in lifecycle hook".to_string());
        log::warn!("lifecycle hook panicked: {message}");
    }
}
