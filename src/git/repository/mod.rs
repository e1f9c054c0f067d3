//! `Repository`: the orchestrator's handle onto a git checkout.
//!
//! Grounded on `worktrunk::git::Repository`, but the `run_*` split is
//! inverted: every call here returns a [`CommandResult`] rather than
//! bailing on a nonzero exit, since the merge pipeline and scheduler treat
//! most nonzero exits (merge conflicts, rebase stops) as data rather than
//! failure. Only a failure to spawn `git` itself becomes a [`GitError`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::command::CommandExecutor;
use crate::git::GitError;
use crate::git::parse::{self, BranchEntry, LogEntry, NumstatEntry, StatusEntry};
use crate::git::{Worktree, worktrees_from_porcelain};

/// Memoized results for queries that are pure given a repository's current
/// state and get called repeatedly across a run (once per task, sometimes
/// more). Shared behind an `Arc` so cheap `Repository` clones (one per
/// scheduler worker) still hit the same cache.
#[derive(Debug, Default)]
struct RepoCache {
    current_branch: DashMap<PathBuf, Option<String>>,
    default_branch: DashMap<String, String>,
}

/// Default ceiling for any single git invocation. Generous because some
/// operations (clone-less worktree creation on a large repo) can be slow,
/// but still bounded so a hung process doesn't wedge a worker forever.
const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default ceiling for `merge`/`rebase` specifically, distinct from (and
/// shorter than) [`DEFAULT_GIT_TIMEOUT`]: these run inside a scheduler wave
/// where a stuck merge should surface quickly rather than hold a worker for
/// two minutes. Overridable per [`Repository`] via `with_merge_timeout`.
const DEFAULT_MERGE_TIMEOUT: Duration = Duration::from_secs(30);

/// The outcome of a git invocation that completed (spawned and exited).
/// A nonzero `exit_code` is not wrapped in `Err` — callers inspect it.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    executor: CommandExecutor,
    cache: Arc<RepoCache>,
    merge_timeout: Duration,
}

impl Repository {
    /// Discover the repository containing `path` via `git rev-parse
    /// --show-toplevel`.
    pub fn at(path: &Path) -> Result<Self, GitError> {
        let executor = CommandExecutor::new();
        let out = executor
            .run(
                "git",
                &["rev-parse", "--show-toplevel"],
                path,
                &HashMap::new(),
                Some(DEFAULT_GIT_TIMEOUT),
            )
            .map_err(|e| GitError::CommandFailed {
                command: "git".to_string(),
                args: vec!["rev-parse".to_string(), "--show-toplevel".to_string()],
                exit_code: None,
                stderr: e.to_string(),
            })?;

        if !out.success() {
            return Err(GitError::NotARepository {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            root: PathBuf::from(out.stdout.trim()),
            executor,
            cache: Arc::new(RepoCache::default()),
            merge_timeout: DEFAULT_MERGE_TIMEOUT,
        })
    }

    /// Override the timeout applied to `merge`/`rebase` invocations (default
    /// 30s, separate from the general git-command timeout).
    pub fn with_merge_timeout(mut self, timeout: Duration) -> Self {
        self.merge_timeout = timeout;
        self
    }

    pub fn current() -> Result<Self, GitError> {
        let cwd = std::env::current_dir().map_err(|e| GitError::CommandFailed {
            command: "getcwd".to_string(),
            args: vec![],
            exit_code: None,
            stderr: e.to_string(),
        })?;
        Self::at(&cwd)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `git <args>` in the repository root, never bailing on a nonzero
    /// exit code. Only spawn failures become `Err`.
    pub fn run(&self, args: &[&str]) -> Result<CommandResult, GitError> {
        self.run_in(&self.root, args)
    }

    /// Run `git <args>` in a specific directory (typically a worktree
    /// path), never bailing on a nonzero exit code.
    pub fn run_in(&self, dir: &Path, args: &[&str]) -> Result<CommandResult, GitError> {
        self.run_in_timeout(dir, args, DEFAULT_GIT_TIMEOUT)
    }

    /// Like [`Self::run_in`], but with an explicit timeout rather than the
    /// general [`DEFAULT_GIT_TIMEOUT`]. Used by `merge`/`rebase`, whose
    /// default ceiling is [`DEFAULT_MERGE_TIMEOUT`].
    fn run_in_timeout(&self, dir: &Path, args: &[&str], timeout: Duration) -> Result<CommandResult, GitError> {
        let out = self
            .executor
            .run("git", args, dir, &HashMap::new(), Some(timeout))
            .map_err(|e| GitError::CommandFailed {
                command: "git".to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                exit_code: e.exit_code,
                stderr: e.to_string(),
            })?;

        if out.timed_out {
            return Err(GitError::CommandTimeout {
                command: "git".to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            });
        }

        Ok(CommandResult {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            timed_out: out.timed_out,
        })
    }

    /// Run `git <args>`, converting a nonzero exit into `Err`. Use when the
    /// caller has no use for a failure result beyond surfacing it.
    pub fn run_checked(&self, args: &[&str]) -> Result<CommandResult, GitError> {
        let result = self.run(args)?;
        if !result.success() {
            return Err(GitError::CommandFailed {
                command: "git".to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }

    /// `worktree add -B {branch} {path} {base}`. The `-B` is mandatory: a
    /// single atomic invocation that creates-or-resets the branch and the
    /// checkout together, eliminating the race a separate delete-then-create
    /// would have.
    pub fn worktree_add_atomic(&self, path: &Path, branch: &str, base: &str) -> Result<CommandResult, GitError> {
        let path_str = path.to_string_lossy();
        self.run(&["worktree", "add", "-B", branch, &path_str, base])
    }

    /// `worktree add --detach {path} {target}`. Used by the safe-merge
    /// scratch worktree: `--detach` avoids the "branch already checked out"
    /// lock error when `target` is simultaneously checked out in the main
    /// repository.
    pub fn worktree_add_detached(&self, path: &Path, target: &str) -> Result<CommandResult, GitError> {
        let path_str = path.to_string_lossy();
        self.run(&["worktree", "add", "--detach", &path_str, target])
    }

    pub fn worktree_remove(&self, path: &Path, force: bool) -> Result<CommandResult, GitError> {
        let path_str = path.to_string_lossy();
        if force {
            self.run(&["worktree", "remove", "-f", &path_str])
        } else {
            self.run(&["worktree", "remove", &path_str])
        }
    }

    pub fn worktree_prune(&self) -> Result<CommandResult, GitError> {
        self.run(&["worktree", "prune"])
    }

    pub fn list_worktrees(&self) -> Result<Vec<Worktree>, GitError> {
        let result = self.run_checked(&["worktree", "list", "--porcelain"])?;
        Ok(worktrees_from_porcelain(&result.stdout))
    }

    /// Cached per directory: a worktree's checked-out branch doesn't change
    /// behind this `Repository`'s back within a single scheduler run.
    pub fn current_branch(&self, dir: &Path) -> Result<Option<String>, GitError> {
        if let Some(cached) = self.cache.current_branch.get(dir) {
            return Ok(cached.clone());
        }
        let result = self.run_in(dir, &["symbolic-ref", "--short", "-q", "HEAD"])?;
        let branch = if !result.success() {
            None
        } else {
            let trimmed = result.stdout.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        };
        self.cache.current_branch.insert(dir.to_path_buf(), branch.clone());
        Ok(branch)
    }

    pub fn status(&self, dir: &Path) -> Result<Vec<StatusEntry>, GitError> {
        let result = self.run_in(dir, &["status", "--porcelain"])?;
        Ok(parse::parse_status_porcelain(&result.stdout))
    }

    pub fn has_uncommitted_changes(&self, dir: &Path) -> Result<bool, GitError> {
        Ok(!self.status(dir)?.is_empty())
    }

    pub fn branch_list(&self) -> Result<Vec<BranchEntry>, GitError> {
        let result = self.run_checked(&["branch", "--list", "-v"])?;
        Ok(parse::parse_branch_list(&result.stdout))
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        Ok(self.branch_list()?.iter().any(|b| b.name == name))
    }

    pub fn commits_since_base(&self, dir: &Path, base: &str) -> Result<Vec<LogEntry>, GitError> {
        let range = format!("{base}..HEAD");
        let result = self.run_in(dir, &["log", "--oneline", &range])?;
        Ok(parse::parse_log_oneline(&result.stdout))
    }

    pub fn diff_name_only(&self, dir: &Path, base: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{base}..HEAD");
        let result = self.run_in(dir, &["diff", "--name-only", &range])?;
        Ok(parse::parse_name_only(&result.stdout))
    }

    /// Combines `--numstat` (line counts, binary detection, rename paths)
    /// with a second `--name-status` call (new/deleted/renamed status
    /// letters) — `--numstat` alone never reports whether a path is new or
    /// deleted, only how it changed.
    pub fn diff_stats(&self, dir: &Path, base: &str) -> Result<Vec<NumstatEntry>, GitError> {
        let range = format!("{base}..HEAD");
        let numstat = self.run_in(dir, &["diff", "--numstat", "--find-renames", &range])?;
        let mut entries = parse::parse_numstat(&numstat.stdout);

        let name_status = self.run_in(dir, &["diff", "--name-status", "--find-renames", &range])?;
        let statuses = parse::parse_name_status(&name_status.stdout);
        parse::apply_name_status(&mut entries, &statuses);

        Ok(entries)
    }

    pub fn diff_content(&self, dir: &Path, base: &str, path: &str) -> Result<String, GitError> {
        let range = format!("{base}..HEAD");
        let result = self.run_in(dir, &["diff", &range, "--", path])?;
        Ok(result.stdout)
    }

    /// `stash push -u [-m message]`. Returns `false` in `stdout` detection
    /// terms handled by the caller — this just runs the command.
    pub fn stash_push(&self, dir: &Path, message: &str) -> Result<CommandResult, GitError> {
        self.run_in(dir, &["stash", "push", "-u", "-m", message])
    }

    pub fn stash_pop(&self, dir: &Path) -> Result<CommandResult, GitError> {
        self.run_in(dir, &["stash", "pop"])
    }

    pub fn stash_list(&self, dir: &Path) -> Result<Vec<String>, GitError> {
        let result = self.run_in(dir, &["stash", "list"])?;
        Ok(result.stdout.lines().map(str::to_string).collect())
    }

    pub fn checkout(&self, dir: &Path, branch: &str) -> Result<CommandResult, GitError> {
        self.run_in(dir, &["checkout", branch])
    }

    pub fn checkout_new_branch(&self, dir: &Path, branch: &str, base: &str) -> Result<CommandResult, GitError> {
        self.run_in(dir, &["checkout", "-b", branch, base])
    }

    /// Best-effort `pull origin <branch>`; network failures are the
    /// caller's to swallow.
    pub fn pull(&self, dir: &Path, remote: &str, branch: &str) -> Result<CommandResult, GitError> {
        self.run_in(dir, &["pull", remote, branch])
    }

    pub fn delete_local_branch(&self, name: &str, force: bool) -> Result<CommandResult, GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, name])
    }

    pub fn merge(
        &self,
        dir: &Path,
        source: &str,
        message: &str,
        allow_fast_forward: bool,
    ) -> Result<CommandResult, GitError> {
        if allow_fast_forward {
            self.run_in_timeout(dir, &["merge", source, "-m", message], self.merge_timeout)
        } else {
            self.run_in_timeout(dir, &["merge", "--no-ff", source, "-m", message], self.merge_timeout)
        }
    }

    pub fn merge_abort(&self, dir: &Path) -> Result<CommandResult, GitError> {
        self.run_in_timeout(dir, &["merge", "--abort"], self.merge_timeout)
    }

    pub fn is_merge_in_progress(&self, dir: &Path) -> Result<bool, GitError> {
        let result = self.run_in(dir, &["rev-parse", "--verify", "-q", "MERGE_HEAD"])?;
        Ok(result.success())
    }

    pub fn rebase(&self, dir: &Path, target: &str) -> Result<CommandResult, GitError> {
        self.run_in_timeout(dir, &["rebase", target], self.merge_timeout)
    }

    pub fn rebase_abort(&self, dir: &Path) -> Result<CommandResult, GitError> {
        self.run_in_timeout(dir, &["rebase", "--abort"], self.merge_timeout)
    }

    pub fn rebase_continue(&self, dir: &Path) -> Result<CommandResult, GitError> {
        self.run_in_timeout(dir, &["rebase", "--continue"], self.merge_timeout)
    }

    /// Rebase state lives under the worktree's own git-dir (`.git/worktrees/
    /// <name>/rebase-merge` for a linked worktree), so this resolves
    /// `--git-dir` rather than assuming `dir/.git` is a directory.
    pub fn is_rebase_in_progress(&self, dir: &Path) -> bool {
        let Ok(result) = self.run_in(dir, &["rev-parse", "--git-dir"]) else {
            return false;
        };
        if !result.success() {
            return false;
        }
        let git_dir = dir.join(result.stdout.trim());
        git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
    }

    pub fn add_all(&self, dir: &Path) -> Result<CommandResult, GitError> {
        self.run_in(dir, &["add", "-A"])
    }

    pub fn head_sha(&self, dir: &Path) -> Result<String, GitError> {
        let result = self.run_checked_in(dir, &["rev-parse", "HEAD"])?;
        Ok(result.stdout.trim().to_string())
    }

    fn run_checked_in(&self, dir: &Path, args: &[&str]) -> Result<CommandResult, GitError> {
        let result = self.run_in(dir, args)?;
        if !result.success() {
            return Err(GitError::CommandFailed {
                command: "git".to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }

    /// Cached per remote: resolving this involves a `symbolic-ref` plus,
    /// on a shallow clone without that ref, up to two `branch_exists`
    /// probes, and every task in a batch asks for the same remote's
    /// default branch.
    pub fn default_branch(&self, remote: &str) -> Result<String, GitError> {
        if let Some(cached) = self.cache.default_branch.get(remote) {
            return Ok(cached.clone());
        }

        let resolved = self.resolve_default_branch(remote)?;
        self.cache.default_branch.insert(remote.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn resolve_default_branch(&self, remote: &str) -> Result<String, GitError> {
        let local = self.run(&["symbolic-ref", &format!("refs/remotes/{remote}/HEAD")])?;
        if local.success() {
            let prefix = format!("refs/remotes/{remote}/");
            let branch = local.stdout.trim().strip_prefix(&prefix).unwrap_or(local.stdout.trim());
            if !branch.is_empty() {
                return Ok(branch.to_string());
            }
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate)? {
                return Ok(candidate.to_string());
            }
        }

        Err(GitError::ParseError(format!(
            "could not determine default branch for remote {remote}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .output()
                .unwrap();
        };
        run(&["init", "-q", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
        dir
    }

    #[test]
    fn discovers_repository_root() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        assert_eq!(
            repo.root().canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn non_repository_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Repository::at(dir.path()).unwrap_err();
        assert!(matches!(err, GitError::NotARepository { .. }));
    }

    #[test]
    fn current_branch_reports_main() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        assert_eq!(repo.current_branch(dir.path()).unwrap().as_deref(), Some("main"));
    }

    #[test]
    fn status_reports_untracked_file() {
        let dir = init_repo();
        std::fs::write(dir.path().join("new.txt"), "x").unwrap();
        let repo = Repository::at(dir.path()).unwrap();
        assert!(repo.has_uncommitted_changes(dir.path()).unwrap());
    }

    #[test]
    fn list_worktrees_includes_primary() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        let worktrees = repo.list_worktrees().unwrap();
        assert_eq!(worktrees.len(), 1);
    }

    #[test]
    fn merge_timeout_defaults_to_thirty_seconds() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap();
        assert_eq!(repo.merge_timeout, Duration::from_secs(30));
    }

    #[test]
    fn merge_timeout_is_overridable() {
        let dir = init_repo();
        let repo = Repository::at(dir.path()).unwrap().with_merge_timeout(Duration::from_secs(5));
        assert_eq!(repo.merge_timeout, Duration::from_secs(5));
    }

    #[test]
    fn diff_stats_flags_new_file() {
        let dir = init_repo();
        let run = |args: &[&str]| {
            Command::new("git").args(args).current_dir(dir.path()).output().unwrap();
        };
        run(&["checkout", "-b", "feature"]);
        std::fs::write(dir.path().join("new.txt"), "one\ntwo\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "add new file"]);

        let repo = Repository::at(dir.path()).unwrap();
        let stats = repo.diff_stats(dir.path(), "main").unwrap();
        let entry = stats.iter().find(|e| e.path == "new.txt").unwrap();
        assert!(entry.is_new);
        assert!(!entry.is_deleted);
        assert_eq!(entry.added, Some(2));
    }
}
