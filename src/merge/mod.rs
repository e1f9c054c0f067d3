//! The merge pipeline.

pub mod batch;
pub mod error;
pub mod rebase;
pub mod safe;
pub mod single;
pub mod stash;

pub use batch::{BatchMergeResult, ConflictedBranch, FailedBranch, MergedBranch, batch_merge_with_retry};
pub use error::MergeError;
pub use rebase::{abort_rebase, continue_rebase, is_rebase_in_progress, rebase_branch};
pub use safe::safe_merge_in_worktree;
pub use single::{MergeOutcome, merge_agent_branch};
pub use stash::{StashResult, pop_stash, stash_changes, with_auto_stash};
