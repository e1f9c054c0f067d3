//! Single-branch merge (`mergeAgentBranch`).

use std::path::Path;

use crate::events::{Event, EventBus};
use crate::git::{Repository, parse};
use crate::merge::MergeError;

/// The result of a merge attempt. A conflict is not an error — it's a
/// first-class, successful-return value with `has_conflicts: true`, per the
/// discriminated-union design: a conflict is data, not an error.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Merged { commit: String },
    Conflicted { conflicted_files: Vec<String> },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Conflicted { .. })
    }
}

pub fn merge_agent_branch(
    repo: &Repository,
    events: &EventBus,
    source: &str,
    target: &str,
    work_dir: &Path,
    message: Option<&str>,
    allow_fast_forward: bool,
) -> Result<MergeOutcome, MergeError> {
    events.emit(Event::GitMergeStart {
        source: source.to_string(),
        target: target.to_string(),
    });

    let checkout = repo.checkout(work_dir, target)?;
    if !checkout.success() {
        return Err(MergeError::BranchNotFound {
            branch: target.to_string(),
        });
    }

    let message = message
        .map(str::to_string)
        .unwrap_or_else(|| format!("Merge {source} into {target}"));
    let result = repo.merge(work_dir, source, &message, allow_fast_forward)?;

    if result.success() {
        let commit = repo.head_sha(work_dir)?;
        events.emit(Event::GitMergeComplete {
            source: source.to_string(),
            target: target.to_string(),
            commit: commit.clone(),
        });
        return Ok(MergeOutcome::Merged { commit });
    }

    let status = repo.status(work_dir)?;
    let conflicted_files: Vec<String> = status
        .into_iter()
        .filter(|e| e.is_conflicted())
        .map(|e| e.path)
        .collect();

    if !conflicted_files.is_empty() {
        events.emit(Event::GitMergeConflict {
            source: source.to_string(),
            target: target.to_string(),
            files: conflicted_files.clone(),
        });
        return Ok(MergeOutcome::Conflicted { conflicted_files });
    }

    Err(MergeError::MergeFailed {
        source: source.to_string(),
        target: target.to_string(),
        stderr: result.stderr,
    })
}

/// Shared by [`merge_agent_branch`] and the safe-merge path: read the
/// currently conflicted paths without needing a whole `MergeOutcome`.
pub fn conflicted_files(repo: &Repository, dir: &Path) -> Result<Vec<String>, MergeError> {
    let result = repo.run_in(dir, &["status", "--porcelain"])?;
    Ok(parse::conflicted_paths(&result.stdout))
}
