//! Rebase helpers.

use std::path::Path;

use crate::events::{Event, EventBus};
use crate::git::Repository;
use crate::merge::MergeError;
use crate::merge::single::MergeOutcome;

/// Substrings git uses in its checkout/rebase failure output for the two
/// conditions `rebase_branch` must distinguish from a generic command
/// failure.
const DIRTY_WORKTREE_MARKERS: &[&str] = &["would be overwritten by", "Please commit your changes"];
const BRANCH_LOCKED_MARKERS: &[&str] = &["already used by worktree", "already checked out"];

/// Parallels `merge_agent_branch`, but on checkout failure inspects git's
/// stderr to distinguish a dirty-worktree checkout block from a
/// branch-locked-by-another-worktree block.
pub fn rebase_branch(
    repo: &Repository,
    events: &EventBus,
    source: &str,
    target: &str,
    work_dir: &Path,
) -> Result<MergeOutcome, MergeError> {
    events.emit(Event::GitRebaseStart {
        source: source.to_string(),
        target: target.to_string(),
    });

    let checkout = repo.checkout(work_dir, source)?;
    if !checkout.success() {
        if BRANCH_LOCKED_MARKERS.iter().any(|m| checkout.stderr.contains(m)) {
            return Err(MergeError::BranchLocked {
                branch: source.to_string(),
            });
        }
        if DIRTY_WORKTREE_MARKERS.iter().any(|m| checkout.stderr.contains(m)) {
            return Err(MergeError::DirtyWorktree {
                path: work_dir.to_path_buf(),
            });
        }
        return Err(MergeError::BranchNotFound {
            branch: source.to_string(),
        });
    }

    let result = repo.rebase(work_dir, target)?;
    if result.success() {
        let commit = repo.head_sha(work_dir)?;
        events.emit(Event::GitRebaseComplete {
            source: source.to_string(),
            target: target.to_string(),
        });
        return Ok(MergeOutcome::Merged { commit });
    }

    let conflicted_files = super::single::conflicted_files(repo, work_dir)?;
    if !conflicted_files.is_empty() {
        events.emit(Event::GitRebaseConflict {
            source: source.to_string(),
            target: target.to_string(),
        });
        return Ok(MergeOutcome::Conflicted { conflicted_files });
    }

    Err(MergeError::RebaseFailed {
        source: source.to_string(),
        target: target.to_string(),
        stderr: result.stderr,
    })
}

pub fn abort_rebase(repo: &Repository, work_dir: &Path) -> Result<(), MergeError> {
    let result = repo.rebase_abort(work_dir)?;
    if !result.success() {
        return Err(MergeError::RebaseFailed {
            source: "HEAD".to_string(),
            target: "HEAD".to_string(),
            stderr: result.stderr,
        });
    }
    Ok(())
}

pub fn continue_rebase(repo: &Repository, work_dir: &Path) -> Result<MergeOutcome, MergeError> {
    repo.add_all(work_dir)?;
    let result = repo.rebase_continue(work_dir)?;
    if result.success() {
        let commit = repo.head_sha(work_dir)?;
        return Ok(MergeOutcome::Merged { commit });
    }

    let conflicted_files = super::single::conflicted_files(repo, work_dir)?;
    if !conflicted_files.is_empty() {
        return Ok(MergeOutcome::Conflicted { conflicted_files });
    }

    Err(MergeError::RebaseFailed {
        source: "HEAD".to_string(),
        target: "HEAD".to_string(),
        stderr: result.stderr,
    })
}

pub fn is_rebase_in_progress(repo: &Repository, work_dir: &Path) -> bool {
    repo.is_rebase_in_progress(work_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
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
        std::fs::write(dir.path().join("file.txt"), "base\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
        dir
    }

    fn run(dir: &Path, args: &[&str]) {
        Command::new("git").args(args).current_dir(dir).output().unwrap();
    }

    #[test]
    fn clean_rebase_succeeds() {
        let dir = init_repo();
        run(dir.path(), &["checkout", "-b", "feature"]);
        std::fs::write(dir.path().join("feature.txt"), "x\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-q", "-m", "feature commit"]);

        let repo = Repository::at(dir.path()).unwrap();
        let events = EventBus::new();
        let outcome = rebase_branch(&repo, &events, "feature", "main", dir.path()).unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged { .. }));
    }

    #[test]
    fn not_rebasing_reports_false() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        assert!(!is_rebase_in_progress(&repo, dir.path()));
    }
}
