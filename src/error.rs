//! Crate-level error taxonomy.
//!
//! Component modules (`git`, `worktree`, `merge`, `scheduler`) each define
//! their own flat error enum, the way `worktrunk::git::GitError` stands
//! alone as the error type for everything under `worktrunk::git`. This
//! module unifies them into one enum for the public API, with `From`
//! conversions so `?` works across module boundaries.

use crate::git::GitError;
use crate::merge::MergeError;
use crate::scheduler::SchedulerError;
use crate::worktree::WorktreeError;

#[derive(Debug)]
pub enum OrchestratorError {
    Git(GitError),
    Worktree(WorktreeError),
    Merge(MergeError),
    Scheduler(SchedulerError),
    InvalidArgument(String),
    Unknown(String),
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::Git(e) => write!(f, "{e}"),
            OrchestratorError::Worktree(e) => write!(f, "{e}"),
            OrchestratorError::Merge(e) => write!(f, "{e}"),
            OrchestratorError::Scheduler(e) => write!(f, "{e}"),
            OrchestratorError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            OrchestratorError::Unknown(msg) => write!(f, "unknown error: {msg}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<GitError> for OrchestratorError {
    fn from(e: GitError) -> Self {
        OrchestratorError::Git(e)
    }
}

impl From<WorktreeError> for OrchestratorError {
    fn from(e: WorktreeError) -> Self {
        OrchestratorError::Worktree(e)
    }
}

impl From<MergeError> for OrchestratorError {
    fn from(e: MergeError) -> Self {
        OrchestratorError::Merge(e)
    }
}

impl From<SchedulerError> for OrchestratorError {
    fn from(e: SchedulerError) -> Self {
        OrchestratorError::Scheduler(e)
    }
}
