//! Git plumbing: porcelain parsing and a thin `Repository` wrapper around
//! [`crate::command::CommandExecutor`].

pub mod error;
pub mod parse;
pub mod repository;

pub use error::GitError;
pub use repository::Repository;

use std::path::PathBuf;

/// A worktree as seen by the orchestrator, derived from
/// [`parse::WorktreeEntry`] plus whatever domain interpretation the caller
/// needs (bare worktrees are filtered out before this type is built).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub detached: bool,
    pub locked: Option<String>,
    pub prunable: Option<String>,
}

impl Worktree {
    fn from_entry(entry: parse::WorktreeEntry) -> Option<Self> {
        if entry.bare {
            return None;
        }
        Some(Self {
            path: entry.path,
            head: entry.head,
            branch: entry.branch,
            detached: entry.detached,
            locked: entry.locked,
            prunable: entry.prunable,
        })
    }

    pub fn is_prunable(&self) -> bool {
        self.prunable.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }
}

/// Parse `git worktree list --porcelain` output into domain [`Worktree`]
/// values, dropping the bare-repository entry.
pub fn worktrees_from_porcelain(output: &str) -> Vec<Worktree> {
    parse::parse_worktree_list(output)
        .into_iter()
        .filter_map(Worktree::from_entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_worktree_is_filtered_out() {
        let output = "worktree /repo\nHEAD abc123\nbare\n\nworktree /repo/.milhouse/work/worktrees/r-t\nHEAD def456\nbranch refs/heads/mh/ex/r/t\n\n";
        let worktrees = worktrees_from_porcelain(output);
        assert_eq!(worktrees.len(), 1);
        assert_eq!(worktrees[0].branch.as_deref(), Some("mh/ex/r/t"));
    }
}
