//! Errors surfaced by strategy selection and execution.

#[derive(Debug)]
pub enum SchedulerError {
    NoTasks,
    Worktree(crate::worktree::WorktreeError),
    Merge(crate::merge::MergeError),
    Git(crate::git::GitError),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::NoTasks => write!(f, "no tasks to execute"),
            SchedulerError::Worktree(e) => write!(f, "{e}"),
            SchedulerError::Merge(e) => write!(f, "{e}"),
            SchedulerError::Git(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<crate::worktree::WorktreeError> for SchedulerError {
    fn from(e: crate::worktree::WorktreeError) -> Self {
        SchedulerError::Worktree(e)
    }
}

impl From<crate::merge::MergeError> for SchedulerError {
    fn from(e: crate::merge::MergeError) -> Self {
        SchedulerError::Merge(e)
    }
}

impl From<crate::git::GitError> for SchedulerError {
    fn from(e: crate::git::GitError) -> Self {
        SchedulerError::Git(e)
    }
}
