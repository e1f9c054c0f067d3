//! The branch service: per-task branch bookkeeping.

use std::path::Path;

use crate::events::{Event, EventBus};
use crate::git::Repository;
use crate::task::Task;
use crate::worktree::WorktreeError;
use crate::worktree::naming::{self, STASH_ID};

/// Result of [`BranchService::create_task_branch`].
#[derive(Debug, Clone)]
pub struct TaskBranch {
    pub branch_name: String,
    pub stashed: bool,
    pub previous_branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BranchService<'repo> {
    repo: &'repo Repository,
    events: &'repo EventBus,
}

impl<'repo> BranchService<'repo> {
    pub fn new(repo: &'repo Repository, events: &'repo EventBus) -> Self {
        Self { repo, events }
    }

    /// Stash (if dirty and requested), switch to `base_branch`, best-effort
    /// pull, then create-or-reuse the task branch. The stash is popped
    /// exactly once along every exit path by funneling every return through
    /// `finish`, which pops iff `stashed` is still true.
    pub fn create_task_branch(
        &self,
        task: &Task,
        base_branch: &str,
        work_dir: &Path,
        stash_changes: bool,
        branch_prefix: Option<&str>,
    ) -> Result<TaskBranch, WorktreeError> {
        let previous_branch = self.repo.current_branch(work_dir)?;

        let mut stashed = false;
        if stash_changes && self.repo.has_uncommitted_changes(work_dir)? {
            let result = self.repo.stash_push(work_dir, STASH_ID)?;
            stashed = result.success();
        }

        let outcome = self.create_task_branch_inner(task, base_branch, work_dir, branch_prefix);

        if stashed {
            let pop = self.repo.stash_pop(work_dir);
            if let Err(e) = pop {
                log::warn!("stash pop failed after createTaskBranch: {e}");
            } else if let Ok(result) = pop
                && !result.success()
            {
                log::warn!("stash pop reported failure after createTaskBranch: {}", result.stderr);
            }
        }

        outcome.map(|branch_name| TaskBranch {
            branch_name,
            stashed,
            previous_branch,
        })
    }

    fn create_task_branch_inner(
        &self,
        task: &Task,
        base_branch: &str,
        work_dir: &Path,
        branch_prefix: Option<&str>,
    ) -> Result<String, WorktreeError> {
        let checkout = self.repo.checkout(work_dir, base_branch)?;
        if !checkout.success() {
            return Err(WorktreeError::BranchNotFound {
                branch: base_branch.to_string(),
            });
        }

        // Best-effort refresh; network failures are swallowed, not surfaced.
        let _ = self.repo.pull(work_dir, "origin", base_branch);

        let branch_name = match branch_prefix {
            Some(prefix) => format!("{prefix}/{}", naming::slug(&task.title)),
            None => naming::task_branch(&task.title),
        };

        if self.repo.branch_exists(&branch_name)? {
            let result = self.repo.checkout(work_dir, &branch_name)?;
            if !result.success() {
                return Err(WorktreeError::BranchLocked { branch: branch_name });
            }
        } else {
            let result = self.repo.checkout_new_branch(work_dir, &branch_name, base_branch)?;
            if !result.success() {
                return Err(WorktreeError::Git(crate::git::GitError::CommandFailed {
                    command: "git".to_string(),
                    args: vec!["checkout".to_string(), "-b".to_string(), branch_name.clone()],
                    exit_code: result.exit_code,
                    stderr: result.stderr,
                }));
            }
            self.events.emit(Event::GitBranchCreate {
                branch: branch_name.clone(),
            });
        }

        Ok(branch_name)
    }

    pub fn get_current_branch(&self, work_dir: &Path) -> Result<Option<String>, WorktreeError> {
        Ok(self.repo.current_branch(work_dir)?)
    }

    /// Prefer `main`, fall back to `master`, fall back to the current
    /// branch.
    pub fn get_default_base_branch(&self, work_dir: &Path) -> Result<String, WorktreeError> {
        for candidate in ["main", "master"] {
            if self.repo.branch_exists(candidate)? {
                return Ok(candidate.to_string());
            }
        }
        self.repo
            .current_branch(work_dir)?
            .ok_or_else(|| WorktreeError::BranchNotFound {
                branch: "HEAD".to_string(),
            })
    }

    pub fn return_to_base_branch(&self, work_dir: &Path, base_branch: &str) -> Result<(), WorktreeError> {
        let result = self.repo.checkout(work_dir, base_branch)?;
        if !result.success() {
            return Err(WorktreeError::BranchNotFound {
                branch: base_branch.to_string(),
            });
        }
        Ok(())
    }

    pub fn has_uncommitted_changes(&self, work_dir: &Path) -> Result<bool, WorktreeError> {
        Ok(self.repo.has_uncommitted_changes(work_dir)?)
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool, WorktreeError> {
        Ok(self.repo.branch_exists(name)?)
    }

    pub fn delete_local_branch(&self, name: &str, force: bool) -> Result<(), WorktreeError> {
        let result = self.repo.delete_local_branch(name, force)?;
        if !result.success() {
            return Err(WorktreeError::BranchNotFound {
                branch: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn list_local_branches(&self) -> Result<Vec<String>, WorktreeError> {
        Ok(self.repo.branch_list()?.into_iter().map(|b| b.name).collect())
    }
}
