//! The worktree service: create and tear down per-task worktrees.

use std::path::{Path, PathBuf};

use crate::git::Repository;
use crate::task::Task;
use crate::worktree::WorktreeError;
use crate::worktree::naming;

/// Result of [`WorktreeService::create_worktree`].
#[derive(Debug, Clone)]
pub struct CreatedWorktree {
    pub worktree_path: PathBuf,
    pub branch_name: String,
    pub worktree_id: String,
}

/// Result of [`WorktreeService::cleanup_worktree`].
#[derive(Debug, Clone)]
pub struct CleanupOutcome {
    pub left_in_place: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorktreeService<'repo> {
    repo: &'repo Repository,
}

impl<'repo> WorktreeService<'repo> {
    pub fn new(repo: &'repo Repository) -> Self {
        Self { repo }
    }

    /// Compute `worktreeId`/`worktreePath`, ensure the layout root exists,
    /// prune, clear any stale directory at that exact path, then create the
    /// checkout atomically with `worktree add -B`.
    pub fn create_worktree(
        &self,
        task: &Task,
        agent: Option<&str>,
        base_branch: &str,
        run_id: &str,
        work_dir: &Path,
    ) -> Result<CreatedWorktree, WorktreeError> {
        let worktree_id = naming::worktree_id(&task.title, agent);
        let worktree_path = naming::worktree_path(work_dir, run_id, &worktree_id);
        let branch_name = naming::agent_branch(run_id, agent, &task.title, None);

        if let Some(parent) = worktree_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WorktreeError::Git(crate::git::GitError::CommandFailed {
                    command: "mkdir".to_string(),
                    args: vec![parent.display().to_string()],
                    exit_code: None,
                    stderr: e.to_string(),
                })
            })?;
        }

        self.repo.worktree_prune()?;

        if worktree_path.exists() {
            std::fs::remove_dir_all(&worktree_path).map_err(|e| {
                WorktreeError::Git(crate::git::GitError::CommandFailed {
                    command: "rm".to_string(),
                    args: vec![worktree_path.display().to_string()],
                    exit_code: None,
                    stderr: e.to_string(),
                })
            })?;
            self.repo.worktree_prune()?;
        }

        let result = self.repo.worktree_add_atomic(&worktree_path, &branch_name, base_branch)?;
        if !result.success() {
            return Err(WorktreeError::Git(crate::git::GitError::CommandFailed {
                command: "git".to_string(),
                args: vec!["worktree".to_string(), "add".to_string(), "-B".to_string(), branch_name],
                exit_code: result.exit_code,
                stderr: result.stderr,
            }));
        }

        Ok(CreatedWorktree {
            worktree_path,
            branch_name,
            worktree_id,
        })
    }

    /// Remove `path` unless it has uncommitted changes and `force` is
    /// false, in which case it is left in place. Never touches the branch.
    pub fn cleanup_worktree(&self, path: &Path, force: bool) -> Result<CleanupOutcome, WorktreeError> {
        if !force && path.exists() && self.repo.has_uncommitted_changes(path)? {
            return Ok(CleanupOutcome {
                left_in_place: true,
                reason: Some("uncommitted changes".to_string()),
            });
        }

        let result = self.repo.worktree_remove(path, true)?;
        if !result.success() {
            return Ok(CleanupOutcome {
                left_in_place: true,
                reason: Some(result.stderr),
            });
        }

        Ok(CleanupOutcome {
            left_in_place: false,
            reason: None,
        })
    }

    pub fn list_worktrees(&self) -> Result<Vec<crate::git::Worktree>, WorktreeError> {
        Ok(self.repo.list_worktrees()?)
    }

    /// Remove every worktree whose path is "managed" (new or legacy
    /// layout), then prune.
    pub fn cleanup_all_worktrees(&self, force: bool) -> Result<Vec<CleanupOutcome>, WorktreeError> {
        let worktrees = self.list_worktrees()?;
        let mut outcomes = Vec::new();
        for wt in worktrees {
            if !naming::is_managed_worktree_path(&wt.path) {
                continue;
            }
            outcomes.push(self.cleanup_worktree(&wt.path, force)?);
        }
        self.repo.worktree_prune()?;
        Ok(outcomes)
    }

    /// Remove empty legacy `.milhouse/runs/{id}/worktrees/` directories
    /// and their enclosing `{id}/` directory if it holds only that
    /// subtree. Never touches the new layout.
    pub fn cleanup_legacy_worktree_directories(&self, work_dir: &Path) -> Result<Vec<PathBuf>, WorktreeError> {
        let runs_root = work_dir.join(".milhouse").join("runs");
        let mut removed = Vec::new();
        let Ok(entries) = std::fs::read_dir(&runs_root) else {
            return Ok(removed);
        };

        for entry in entries.flatten() {
            let run_dir = entry.path();
            if !run_dir.is_dir() {
                continue;
            }
            let worktrees_dir = run_dir.join("worktrees");
            if !worktrees_dir.is_dir() {
                continue;
            }
            if std::fs::read_dir(&worktrees_dir).map(|mut d| d.next().is_none()).unwrap_or(false) {
                let _ = std::fs::remove_dir(&worktrees_dir);
                removed.push(worktrees_dir);

                let run_dir_is_now_empty = std::fs::read_dir(&run_dir)
                    .map(|mut d| d.next().is_none())
                    .unwrap_or(false);
                if run_dir_is_now_empty {
                    let _ = std::fs::remove_dir(&run_dir);
                    removed.push(run_dir);
                }
            }
        }

        Ok(removed)
    }

    pub fn get_worktree_status(&self, path: &Path) -> Result<Vec<crate::git::parse::StatusEntry>, WorktreeError> {
        Ok(self.repo.status(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskMetadata, TaskPriority, TaskStatus};
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            Command::new("git").args(args).current_dir(dir.path()).output().unwrap();
        };
        run(&["init", "-q", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
        dir
    }

    fn sample_task(title: &str) -> Task {
        Task {
            task_id: "t1".to_string(),
            title: title.to_string(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            metadata: TaskMetadata::default(),
        }
    }

    #[test]
    fn create_worktree_is_under_new_layout_root() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        let svc = WorktreeService::new(&repo);
        let task = sample_task("Fix login");
        let created = svc.create_worktree(&task, None, "main", "run1", dir.path()).unwrap();
        assert!(created.worktree_path.starts_with(dir.path().join(".milhouse/work/worktrees")));
        assert!(created.worktree_path.exists());
        assert!(naming::is_managed_worktree_path(&created.worktree_path));
    }

    #[test]
    fn cleanup_removes_clean_worktree() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        let svc = WorktreeService::new(&repo);
        let task = sample_task("Fix login");
        let created = svc.create_worktree(&task, None, "main", "run1", dir.path()).unwrap();
        let outcome = svc.cleanup_worktree(&created.worktree_path, false).unwrap();
        assert!(!outcome.left_in_place);
        assert!(!created.worktree_path.exists());
    }

    #[test]
    fn cleanup_leaves_dirty_worktree_in_place() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        let svc = WorktreeService::new(&repo);
        let task = sample_task("Fix login");
        let created = svc.create_worktree(&task, None, "main", "run1", dir.path()).unwrap();
        std::fs::write(created.worktree_path.join("scratch.txt"), "wip").unwrap();
        let outcome = svc.cleanup_worktree(&created.worktree_path, false).unwrap();
        assert!(outcome.left_in_place);
        assert!(created.worktree_path.exists());
    }
}
