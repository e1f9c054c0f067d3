//! Errors surfaced by the branch and worktree services.

#[derive(Debug)]
pub enum WorktreeError {
    BranchNotFound { branch: String },
    BranchExists { branch: String },
    BranchLocked { branch: String },
    DirtyWorktree { path: std::path::PathBuf },
    WorktreeNotFound { path: std::path::PathBuf },
    WorktreeExists { path: std::path::PathBuf },
    UncommittedChanges { path: std::path::PathBuf },
    Git(crate::git::GitError),
}

impl std::fmt::Display for WorktreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorktreeError::BranchNotFound { branch } => write!(f, "branch not found: {branch}"),
            WorktreeError::BranchExists { branch } => write!(f, "branch already exists: {branch}"),
            WorktreeError::BranchLocked { branch } => {
                write!(f, "branch checked out in another worktree: {branch}")
            }
            WorktreeError::DirtyWorktree { path } => {
                write!(f, "worktree has uncommitted changes: {}", path.display())
            }
            WorktreeError::WorktreeNotFound { path } => {
                write!(f, "no worktree found at: {}", path.display())
            }
            WorktreeError::WorktreeExists { path } => {
                write!(f, "worktree path already exists: {}", path.display())
            }
            WorktreeError::UncommittedChanges { path } => {
                write!(f, "uncommitted changes at: {}", path.display())
            }
            WorktreeError::Git(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WorktreeError {}

impl From<crate::git::GitError> for WorktreeError {
    fn from(e: crate::git::GitError) -> Self {
        WorktreeError::Git(e)
    }
}
