//! Stash helpers.

use std::path::Path;

use crate::git::Repository;
use crate::merge::MergeError;
use crate::worktree::naming::STASH_ID;

#[derive(Debug, Clone, Copy)]
pub struct StashResult {
    pub stashed: bool,
}

/// `stash push -u -m {STASH_ID}` if there's anything to stash. No event —
/// this operation is best-effort and not separately event-observed.
pub fn stash_changes(repo: &Repository, dir: &Path) -> Result<StashResult, MergeError> {
    if !repo.has_uncommitted_changes(dir)? {
        return Ok(StashResult { stashed: false });
    }
    let result = repo.stash_push(dir, STASH_ID)?;
    Ok(StashResult {
        stashed: result.success(),
    })
}

/// Pop the most recent stash. `Ok(false)` if there was nothing to pop,
/// `Err` only for an actual git failure (conflicting pop, corrupt stash).
pub fn pop_stash(repo: &Repository, dir: &Path) -> Result<bool, MergeError> {
    if repo.stash_list(dir)?.is_empty() {
        return Ok(false);
    }
    let result = repo.stash_pop(dir)?;
    if !result.success() {
        return Err(MergeError::Git(crate::git::GitError::CommandFailed {
            command: "git".to_string(),
            args: vec!["stash".to_string(), "pop".to_string()],
            exit_code: result.exit_code,
            stderr: result.stderr,
        }));
    }
    Ok(true)
}

/// Stash if dirty, run `op`, then unconditionally pop in a finalize block.
/// `op`'s result is always returned; a failed pop is logged as a warning,
/// never turned into the operation's error.
pub fn with_auto_stash<T, E>(
    repo: &Repository,
    dir: &Path,
    op: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<MergeError>,
{
    let stash_result = stash_changes(repo, dir);
    let stashed = matches!(stash_result, Ok(StashResult { stashed: true }));

    let outcome = op();

    if stashed {
        match pop_stash(repo, dir) {
            Ok(_) => {}
            Err(e) => log::warn!("auto-stash pop failed: {e}"),
        }
    }

    outcome
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

    #[test]
    fn stash_changes_is_noop_on_clean_tree() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        let result = stash_changes(&repo, dir.path()).unwrap();
        assert!(!result.stashed);
    }

    #[test]
    fn with_auto_stash_pops_after_op() {
        let dir = init_repo();
        std::fs::write(dir.path().join("file.txt"), "dirty\n").unwrap();
        let repo = Repository::at(dir.path()).unwrap();

        let result: Result<(), MergeError> = with_auto_stash(&repo, dir.path(), || Ok(()));
        assert!(result.is_ok());
        assert_eq!(std::fs::read_to_string(dir.path().join("file.txt")).unwrap(), "dirty\n");
        assert!(repo.stash_list(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn with_auto_stash_pops_even_when_op_fails() {
        let dir = init_repo();
        std::fs::write(dir.path().join("file.txt"), "dirty\n").unwrap();
        let repo = Repository::at(dir.path()).unwrap();

        let result: Result<(), MergeError> = with_auto_stash(&repo, dir.path(), || {
            Err(MergeError::MergeFailed {
                source: "x".to_string(),
                target: "y".to_string(),
                stderr: "boom".to_string(),
            })
        });
        assert!(result.is_err());
        assert!(repo.stash_list(dir.path()).unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("file.txt")).unwrap(), "dirty\n");
    }
}
