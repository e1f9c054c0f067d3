//! Safe-merge-in-temporary-worktree.
//!
//! A merge scratch worktree is always removed before this function
//! returns, on every exit path — success, conflict, or hard error. That's
//! encoded as a scoped guard (a `Drop` impl) rather than duplicating the
//! cleanup call at every return statement.

use std::path::{Path, PathBuf};

use crate::git::Repository;
use crate::merge::MergeError;
use crate::merge::single::MergeOutcome;
use crate::worktree::naming;

struct ScratchWorktreeGuard<'repo> {
    repo: &'repo Repository,
    path: PathBuf,
}

impl Drop for ScratchWorktreeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.repo.worktree_remove(&self.path, true) {
            log::warn!("failed to remove merge scratch worktree {}: {e}", self.path.display());
            // worktree_remove may fail if the add itself failed; fall back
            // to a plain directory removal so no scratch path survives.
            let _ = std::fs::remove_dir_all(&self.path);
            let _ = self.repo.worktree_prune();
        }
    }
}

/// Merge `source` into `target` inside a scratch worktree so the caller's
/// working tree, and any other worktree with `target` checked out, is
/// never touched. The main repository's `target` branch only advances on
/// success.
pub fn safe_merge_in_worktree(
    repo: &Repository,
    work_dir: &Path,
    run_id: &str,
    source: &str,
    target: &str,
) -> Result<MergeOutcome, MergeError> {
    repo.worktree_prune()?;

    let scratch_path = naming::merge_scratch_path(work_dir, run_id);
    if let Some(parent) = scratch_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MergeError::Git(crate::git::GitError::CommandFailed {
                command: "mkdir".to_string(),
                args: vec![parent.display().to_string()],
                exit_code: None,
                stderr: e.to_string(),
            })
        })?;
    }

    let added = repo.worktree_add_detached(&scratch_path, target)?;
    if !added.success() {
        // Nothing was created; no guard needed, nothing to clean up.
        return Err(MergeError::BranchNotFound {
            branch: target.to_string(),
        });
    }

    let _guard = ScratchWorktreeGuard {
        repo,
        path: scratch_path.clone(),
    };

    let message = format!("Merge {source} into {target}");
    let merge_result = repo.merge(&scratch_path, source, &message, false)?;

    if merge_result.success() {
        let commit = repo.head_sha(&scratch_path)?;
        // Fast-forward the real target branch to the scratch merge commit.
        let advance = repo.run(&["update-ref", &format!("refs/heads/{target}"), &commit])?;
        if !advance.success() {
            return Err(MergeError::MergeFailed {
                source: source.to_string(),
                target: target.to_string(),
                stderr: advance.stderr,
            });
        }
        return Ok(MergeOutcome::Merged { commit });
    }

    let conflicted_files = super::single::conflicted_files(repo, &scratch_path)?;
    let _ = repo.merge_abort(&scratch_path);

    if !conflicted_files.is_empty() {
        return Ok(MergeOutcome::Conflicted { conflicted_files });
    }

    Err(MergeError::MergeFailed {
        source: source.to_string(),
        target: target.to_string(),
        stderr: merge_result.stderr,
    })
}
