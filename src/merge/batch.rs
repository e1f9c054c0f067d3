//! Batch merge with retry.

use std::path::Path;

use crate::git::Repository;
use crate::merge::safe::safe_merge_in_worktree;
use crate::merge::single::MergeOutcome;

#[derive(Debug, Clone)]
pub struct MergedBranch {
    pub branch: String,
    pub commit: String,
}

#[derive(Debug, Clone)]
pub struct ConflictedBranch {
    pub branch: String,
    pub conflicted_files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FailedBranch {
    pub branch: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchMergeResult {
    pub succeeded: Vec<MergedBranch>,
    pub failed: Vec<FailedBranch>,
    pub conflicted: Vec<ConflictedBranch>,
}

/// `on_conflict(files, branch, work_dir) -> bool`: `true` means the
/// caller staged and committed a resolution on `branch` and a retry
/// should be attempted; `false` gives up on that branch.
pub fn batch_merge_with_retry(
    repo: &Repository,
    branches: &[String],
    target_branch: &str,
    work_dir: &Path,
    run_id: &str,
    max_retries: u32,
    mut on_conflict: Option<&mut dyn FnMut(&[String], &str, &Path) -> bool>,
) -> BatchMergeResult {
    let mut result = BatchMergeResult::default();

    for branch in branches {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match safe_merge_in_worktree(repo, work_dir, run_id, branch, target_branch) {
                Ok(MergeOutcome::Merged { commit }) => {
                    result.succeeded.push(MergedBranch {
                        branch: branch.clone(),
                        commit,
                    });
                    break;
                }
                Ok(MergeOutcome::Conflicted { conflicted_files }) => {
                    let should_retry = attempt < max_retries
                        && on_conflict
                            .as_mut()
                            .map(|cb| cb(&conflicted_files, branch, work_dir))
                            .unwrap_or(false);
                    if should_retry {
                        continue;
                    }
                    result.conflicted.push(ConflictedBranch {
                        branch: branch.clone(),
                        conflicted_files,
                    });
                    break;
                }
                Err(e) => {
                    result.failed.push(FailedBranch {
                        branch: branch.clone(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }
    }

    result
}
