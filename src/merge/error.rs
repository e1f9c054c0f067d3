//! Errors surfaced by the merge pipeline (error taxonomy
//! surfaced by merges"). A merge *conflict* is deliberately not a variant
//! here — it is carried as data in [`super::MergeOutcome`], per the
//! discriminated-union design: a conflict is data, not an error.

#[derive(Debug)]
pub enum MergeError {
    MergeFailed { source: String, target: String, stderr: String },
    RebaseFailed { source: String, target: String, stderr: String },
    BranchNotFound { branch: String },
    BranchLocked { branch: String },
    DirtyWorktree { path: std::path::PathBuf },
    Git(crate::git::GitError),
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::MergeFailed { source, target, stderr } => {
                write!(f, "merge of {source} into {target} failed: {stderr}")
            }
            MergeError::RebaseFailed { source, target, stderr } => {
                write!(f, "rebase of {source} onto {target} failed: {stderr}")
            }
            MergeError::BranchNotFound { branch } => write!(f, "branch not found: {branch}"),
            MergeError::BranchLocked { branch } => {
                write!(f, "branch checked out in another worktree: {branch}")
            }
            MergeError::DirtyWorktree { path } => {
                write!(f, "worktree has uncommitted changes: {}", path.display())
            }
            MergeError::Git(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<crate::git::GitError> for MergeError {
    fn from(e: crate::git::GitError) -> Self {
        MergeError::Git(e)
    }
}
