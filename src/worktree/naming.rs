//! Branch naming, slugification, worktree paths, and legacy-layout
//! recognition — the sole source of truth for on-disk/on-branch identity.
//!
//! Grounded on `worktrunk::git::parse::DefaultBranchName`'s string-surgery
//! style (strip a known prefix, fall back to the raw value). Every path
//! join here goes through `Path`/`PathBuf`, never string concatenation
//! with a hardcoded separator.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;

pub const STASH_ID: &str = "mh-autostash";
const MAX_SLUG_LEN: usize = 50;

/// Lowercase, collapse runs of non-alphanumerics to a single `-`, trim
/// leading/trailing `-`, and cap at 50 chars. Idempotent: `slug(slug(x)) ==
/// slug(x)`, since the output alphabet is already a fixed point of every
/// transformation applied.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    let truncated: String = trimmed.chars().take(MAX_SLUG_LEN).collect();
    truncated.trim_matches('-').to_string()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 alphabet is ASCII")
}

/// `base36(timestamp)-base36(random4)`. The random component comes from
/// `RandomState`'s OS-seeded hasher rather than pulling in a `rand`
/// dependency for four random characters.
pub fn nonce() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut hasher = RandomState::new().build_hasher();
    millis.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    let random = (hasher.finish() % (36u64.pow(4))) as u64;

    format!("{}-{}", to_base36(millis), to_base36(random))
}

pub fn task_branch(title: &str) -> String {
    format!("mh/task/{}", slug(title))
}

/// `mh/ex/{runId}/[{agentId}/]{slug}[-{nonce}]`.
pub fn agent_branch(run_id: &str, agent_id: Option<&str>, title: &str, nonce: Option<&str>) -> String {
    let mut branch = format!("mh/ex/{run_id}/");
    if let Some(agent) = agent_id {
        branch.push_str(agent);
        branch.push('/');
    }
    branch.push_str(&slug(title));
    if let Some(n) = nonce {
        branch.push('-');
        branch.push_str(n);
    }
    branch
}

pub fn integration_branch(group: u32) -> String {
    format!("mh/int/group-{group}")
}

/// `{slug(task)}[-{agent}]-{base36(ts)}-{rand}`.
pub fn worktree_id(title: &str, agent_id: Option<&str>) -> String {
    let n = nonce();
    match agent_id {
        Some(agent) => format!("{}-{}-{}", slug(title), slug(agent), n),
        None => format!("{}-{}", slug(title), n),
    }
}

fn new_layout_root(work_dir: &Path) -> PathBuf {
    work_dir.join(".milhouse").join("work").join("worktrees")
}

/// `{workDir}/.milhouse/work/worktrees/{runId}-{worktreeId}`.
pub fn worktree_path(work_dir: &Path, run_id: &str, worktree_id: &str) -> PathBuf {
    new_layout_root(work_dir).join(format!("{run_id}-{worktree_id}"))
}

pub fn merge_scratch_path(work_dir: &Path, run_id: &str) -> PathBuf {
    let n = nonce();
    work_dir
        .join(".milhouse")
        .join("runs")
        .join(run_id)
        .join("merge-worktrees")
        .join(format!("merge-{n}"))
}

static NEW_LAYOUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[/\\])\.milhouse[/\\]work[/\\]worktrees[/\\][^/\\]+([/\\]|$)").unwrap());
static LEGACY_FLAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[/\\])\.milhouse-worktrees[/\\][^/\\]+([/\\]|$)").unwrap());
static LEGACY_RUNS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[/\\])\.milhouse[/\\]runs[/\\][^/\\]+[/\\]worktrees[/\\][^/\\]+([/\\]|$)").unwrap()
});

/// `true` iff `path` matches the new worktree layout or one of the two
/// legacy layouts, both of which must be recognized but are never created
/// by this crate.
pub fn is_managed_worktree_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    NEW_LAYOUT_RE.is_match(&text) || LEGACY_FLAT_RE.is_match(&text) || LEGACY_RUNS_RE.is_match(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_collapses_non_alphanumerics() {
        assert_eq!(slug("Fix: Login Bug!"), "fix-login-bug");
    }

    #[test]
    fn slug_is_idempotent() {
        let once = slug("Fix: Login Bug!!! ---");
        let twice = slug(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn slug_trims_and_caps_length() {
        let long = "a".repeat(100);
        let slugged = slug(&long);
        assert_eq!(slugged.len(), MAX_SLUG_LEN);
        assert!(!slugged.starts_with('-') && !slugged.ends_with('-'));
    }

    #[test]
    fn agent_branch_matches_spec_example() {
        // S3: runId="run-abc", title="Fix: Login Bug!", agent="a1", nonce="xyz"
        let branch = agent_branch("run-abc", Some("a1"), "Fix: Login Bug!", Some("xyz"));
        assert_eq!(branch, "mh/ex/run-abc/a1/fix-login-bug-xyz");
    }

    #[test]
    fn task_branch_uses_task_prefix() {
        assert_eq!(task_branch("Fix login"), "mh/task/fix-login");
    }

    #[test]
    fn integration_branch_uses_group_number() {
        assert_eq!(integration_branch(2), "mh/int/group-2");
    }

    #[test]
    fn new_layout_path_is_managed() {
        let work_dir = Path::new("/repo");
        let path = worktree_path(work_dir, "run1", "fix-login-abc123-0001");
        assert!(is_managed_worktree_path(&path));
    }

    #[test]
    fn legacy_flat_layout_is_recognized() {
        let path = Path::new("/repo/.milhouse-worktrees/task1");
        assert!(is_managed_worktree_path(path));
    }

    #[test]
    fn legacy_runs_layout_is_recognized() {
        let path = Path::new("/repo/.milhouse/runs/run1/worktrees/task1");
        assert!(is_managed_worktree_path(path));
    }

    #[test]
    fn unrelated_path_is_not_managed() {
        let path = Path::new("/repo/src/main.rs");
        assert!(!is_managed_worktree_path(path));
    }

    #[test]
    fn worktree_path_is_always_managed_property_9() {
        for (w, r, t) in [("alpha", "run1", "task1"), ("Beta Task!", "run-2", "t-2")] {
            let id = worktree_id(w, None);
            let path = worktree_path(Path::new(t), r, &id);
            assert!(is_managed_worktree_path(&path));
        }
    }
}
