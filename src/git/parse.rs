//! Total parsers for git porcelain output.
//!
//! Every function here takes raw stdout and returns data, never an error.
//! Git's porcelain formats are stable line protocols; a parser that can't
//! make sense of a line skips it rather than failing the whole call, so a
//! minor format change degrades a single entry instead of an entire
//! invocation. Grounded on `worktrunk::git::parse::Worktree::
//! parse_porcelain_list`'s block-based state machine.

use std::path::PathBuf;

/// One block from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
    pub locked: Option<String>,
    pub prunable: Option<String>,
}

impl WorktreeEntry {
    fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
            head: String::new(),
            branch: None,
            bare: false,
            detached: false,
            locked: None,
            prunable: None,
        }
    }
}

/// Parse `git worktree list --porcelain` into one entry per worktree block.
/// Blocks are separated by blank lines; a trailing block with no blank
/// terminator is still captured.
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        if line.is_empty() {
            if let Some(wt) = current.take() {
                entries.push(wt);
            }
            continue;
        }

        let (key, value) = match line.split_once(' ') {
            Some((k, v)) => (k, Some(v)),
            None => (line, None),
        };

        match key {
            "worktree" => {
                if let Some(path) = value {
                    current = Some(WorktreeEntry::new(path));
                }
            }
            "HEAD" => {
                if let (Some(wt), Some(sha)) = (current.as_mut(), value) {
                    wt.head = sha.to_string();
                }
            }
            "branch" => {
                if let (Some(wt), Some(branch_ref)) = (current.as_mut(), value) {
                    let branch = branch_ref.strip_prefix("refs/heads/").unwrap_or(branch_ref);
                    wt.branch = Some(branch.to_string());
                }
            }
            "bare" => {
                if let Some(wt) = current.as_mut() {
                    wt.bare = true;
                }
            }
            "detached" => {
                if let Some(wt) = current.as_mut() {
                    wt.detached = true;
                }
            }
            "locked" => {
                if let Some(wt) = current.as_mut() {
                    wt.locked = Some(value.unwrap_or_default().to_string());
                }
            }
            "prunable" => {
                if let Some(wt) = current.as_mut() {
                    wt.prunable = Some(value.unwrap_or_default().to_string());
                }
            }
            _ => {}
        }
    }

    if let Some(wt) = current {
        entries.push(wt);
    }

    entries
}

/// One entry from `git status --porcelain` (the two-letter XY form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub index_status: char,
    pub worktree_status: char,
    pub path: String,
    /// Present for renames/copies (`R  old -> new`).
    pub orig_path: Option<String>,
}

impl StatusEntry {
    pub fn is_clean_line(&self) -> bool {
        self.index_status == ' ' && self.worktree_status == ' '
    }

    /// `true` iff either status char is `U`, or the pair is `DD`/`AA` — the
    /// three-way merge's markers for an unresolved conflict.
    pub fn is_conflicted(&self) -> bool {
        self.index_status == 'U'
            || self.worktree_status == 'U'
            || (self.index_status == 'D' && self.worktree_status == 'D')
            || (self.index_status == 'A' && self.worktree_status == 'A')
    }
}

/// Paths from `git status --porcelain` output that are currently
/// conflicted, per [`StatusEntry::is_conflicted`].
pub fn conflicted_paths(output: &str) -> Vec<String> {
    parse_status_porcelain(output)
        .into_iter()
        .filter(StatusEntry::is_conflicted)
        .map(|e| e.path)
        .collect()
}

/// Parse `git status --porcelain` output. Lines shorter than the `XY path`
/// minimum are skipped rather than erroring.
pub fn parse_status_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            let mut chars = line.chars();
            let index_status = chars.next()?;
            let worktree_status = chars.next()?;
            let rest = line.get(3..)?;
            let (path, orig_path) = match rest.split_once(" -> ") {
                Some((from, to)) => (to.to_string(), Some(from.to_string())),
                None => (rest.to_string(), None),
            };
            Some(StatusEntry {
                index_status,
                worktree_status,
                path,
                orig_path,
            })
        })
        .collect()
}

/// `true` if `git status --porcelain` output describes a clean tree.
pub fn is_worktree_clean(output: &str) -> bool {
    parse_status_porcelain(output).is_empty()
}

/// One entry from `git branch --list -v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEntry {
    pub name: String,
    pub is_current: bool,
    pub head_sha: String,
    pub subject: String,
}

/// Parse `git branch --list -v` output (`* name sha subject` / `  name sha
/// subject`, or `+ name sha subject` for a branch checked out in another
/// worktree).
pub fn parse_branch_list(output: &str) -> Vec<BranchEntry> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let is_current = line.starts_with('*');
            let rest = line.get(2..).unwrap_or("").trim_start();
            let mut parts = rest.splitn(3, char::is_whitespace);
            let name = parts.next()?.to_string();
            let head_sha = parts.next().unwrap_or_default().to_string();
            let subject = parts.next().unwrap_or_default().trim_start().to_string();
            if name.is_empty() {
                return None;
            }
            Some(BranchEntry {
                name,
                is_current,
                head_sha,
                subject,
            })
        })
        .collect()
}

/// Parse `git diff --name-only` output into a list of changed paths.
pub fn parse_name_only(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// One entry from `git log --oneline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub sha: String,
    pub subject: String,
}

/// Parse `git log --oneline` output.
pub fn parse_log_oneline(output: &str) -> Vec<LogEntry> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let (sha, subject) = line.split_once(' ').unwrap_or((line, ""));
            if sha.is_empty() {
                return None;
            }
            Some(LogEntry {
                sha: sha.to_string(),
                subject: subject.to_string(),
            })
        })
        .collect()
}

/// One entry from `git diff --numstat`, enriched with the new/deleted/
/// renamed status a companion `--name-status` call carries (see
/// [`apply_name_status`]) — `--numstat` alone never reports file status,
/// only line counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumstatEntry {
    pub path: String,
    /// `None` for binary files, where git prints `-`.
    pub added: Option<u64>,
    pub removed: Option<u64>,
    pub is_binary: bool,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_renamed: bool,
    pub original_path: Option<String>,
}

/// Expand a numstat path field that may carry a rename, in either git
/// rename-notation form: the compact `common/{old => new}tail` brace form,
/// or the plain `old/path => new/path` form used when there's no shared
/// prefix/suffix to factor out.
///
/// Returns `(path, is_renamed, original_path)`.
fn resolve_numstat_path(raw: &str) -> (String, bool, Option<String>) {
    if let Some(brace_start) = raw.find('{')
        && let Some(rel_end) = raw[brace_start..].find('}')
    {
        let brace_end = brace_start + rel_end;
        let prefix = &raw[..brace_start];
        let suffix = &raw[brace_end + 1..];
        let inner = &raw[brace_start + 1..brace_end];
        if let Some((old_part, new_part)) = inner.split_once(" => ") {
            let original_path = format!("{prefix}{old_part}{suffix}");
            let path = format!("{prefix}{new_part}{suffix}");
            return (path, true, Some(original_path));
        }
    }

    if let Some((old_path, new_path)) = raw.split_once(" => ") {
        return (new_path.to_string(), true, Some(old_path.to_string()));
    }

    (raw.to_string(), false, None)
}

/// Parse `git diff --numstat` output (`added\tremoved\tpath`, `-` for
/// binary files). `is_new`/`is_deleted` are left `false` here — numstat
/// alone can't distinguish a from-scratch file from one that's merely all
/// additions — and are filled in by [`apply_name_status`].
pub fn parse_numstat(output: &str) -> Vec<NumstatEntry> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let added_raw = fields.next()?;
            let removed_raw = fields.next()?;
            let path_raw = fields.next()?;
            let is_binary = added_raw == "-" && removed_raw == "-";
            let (path, is_renamed, original_path) = resolve_numstat_path(path_raw);
            Some(NumstatEntry {
                path,
                added: added_raw.parse().ok(),
                removed: removed_raw.parse().ok(),
                is_binary,
                is_new: false,
                is_deleted: false,
                is_renamed,
                original_path,
            })
        })
        .collect()
}

/// One entry from `git diff --name-status`: a status letter (`A`dded,
/// `M`odified, `D`eleted, `R`enamed, `C`opied) plus the path(s) it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameStatusEntry {
    pub status: char,
    pub path: String,
    pub original_path: Option<String>,
}

/// Parse `git diff --name-status` output. A rename/copy status (`R100`,
/// `C75`, …) carries two tab-separated paths; every other status carries
/// one.
pub fn parse_name_status(output: &str) -> Vec<NameStatusEntry> {
    output
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let code = fields.next()?;
            let status = code.chars().next()?;
            match status {
                'R' | 'C' => {
                    let original_path = fields.next()?.to_string();
                    let path = fields.next()?.to_string();
                    Some(NameStatusEntry {
                        status,
                        path,
                        original_path: Some(original_path),
                    })
                }
                _ => {
                    let path = fields.next()?.to_string();
                    Some(NameStatusEntry {
                        status,
                        path,
                        original_path: None,
                    })
                }
            }
        })
        .collect()
}

/// Annotate `entries` (from [`parse_numstat`]) with `is_new`/`is_deleted`
/// by matching each entry's resolved path against `statuses` (from
/// [`parse_name_status`]) run over the same range.
pub fn apply_name_status(entries: &mut [NumstatEntry], statuses: &[NameStatusEntry]) {
    for entry in entries.iter_mut() {
        if let Some(status) = statuses.iter().find(|s| s.path == entry.path) {
            entry.is_new = status.status == 'A';
            entry.is_deleted = status.status == 'D';
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worktree_list_with_multiple_blocks() {
        let output = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\nworktree /repo/.milhouse/work/worktrees/run1-task1\nHEAD def456\nbranch refs/heads/mh/ex/run1/task1\n\n";
        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].branch.as_deref(), Some("mh/ex/run1/task1"));
    }

    #[test]
    fn parses_worktree_list_without_trailing_blank_line() {
        let output = "worktree /repo\nHEAD abc123\nbare";
        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].bare);
    }

    #[test]
    fn malformed_worktree_line_is_skipped_not_fatal() {
        let output = "worktree\nHEAD abc123\n\n";
        let entries = parse_worktree_list(output);
        assert!(entries.is_empty());
    }

    #[test]
    fn parses_status_porcelain_rename() {
        let entries = parse_status_porcelain("R  old.rs -> new.rs\n M src/lib.rs\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].orig_path.as_deref(), Some("old.rs"));
        assert_eq!(entries[0].path, "new.rs");
        assert!(!entries[1].is_clean_line());
    }

    #[test]
    fn empty_status_is_clean() {
        assert!(is_worktree_clean(""));
        assert!(!is_worktree_clean(" M src/lib.rs\n"));
    }

    #[test]
    fn conflicted_paths_detects_uu_and_dd() {
        let output = "UU src/lib.rs\nDD src/old.rs\nM  src/clean.rs\n";
        let conflicted = conflicted_paths(output);
        assert_eq!(conflicted, vec!["src/lib.rs".to_string(), "src/old.rs".to_string()]);
    }

    #[test]
    fn parses_branch_list_current_marker() {
        let entries = parse_branch_list("* main abc1234 Initial commit\n  mh/task/foo def5678 WIP\n");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_current);
        assert_eq!(entries[1].name, "mh/task/foo");
    }

    #[test]
    fn parses_numstat_binary_as_none() {
        let entries = parse_numstat("3\t1\tsrc/lib.rs\n-\t-\tassets/logo.png\n");
        assert_eq!(entries[0].added, Some(3));
        assert_eq!(entries[0].removed, Some(1));
        assert!(!entries[0].is_binary);
        assert_eq!(entries[1].added, None);
        assert_eq!(entries[1].path, "assets/logo.png");
        assert!(entries[1].is_binary);
    }

    #[test]
    fn parses_numstat_compact_rename_form() {
        let entries = parse_numstat("2\t1\tsrc/{old.rs => new.rs}\n");
        assert_eq!(entries[0].path, "src/new.rs");
        assert_eq!(entries[0].original_path.as_deref(), Some("src/old.rs"));
        assert!(entries[0].is_renamed);
    }

    #[test]
    fn parses_numstat_plain_rename_form() {
        let entries = parse_numstat("2\t1\tsrc/old.rs => dst/new.rs\n");
        assert_eq!(entries[0].path, "dst/new.rs");
        assert_eq!(entries[0].original_path.as_deref(), Some("src/old.rs"));
        assert!(entries[0].is_renamed);
    }

    #[test]
    fn apply_name_status_flags_new_and_deleted() {
        let mut entries = parse_numstat("3\t0\tsrc/added.rs\n0\t5\tsrc/removed.rs\n");
        let statuses = parse_name_status("A\tsrc/added.rs\nD\tsrc/removed.rs\n");
        apply_name_status(&mut entries, &statuses);
        assert!(entries[0].is_new);
        assert!(!entries[0].is_deleted);
        assert!(entries[1].is_deleted);
        assert!(!entries[1].is_new);
    }

    #[test]
    fn parses_name_status_rename_with_two_paths() {
        let entries = parse_name_status("R100\told.rs\tnew.rs\n");
        assert_eq!(entries[0].status, 'R');
        assert_eq!(entries[0].path, "new.rs");
        assert_eq!(entries[0].original_path.as_deref(), Some("old.rs"));
    }

    #[test]
    fn garbage_input_never_panics() {
        let _ = parse_worktree_list("\0\0\0not porcelain at all");
        let _ = parse_status_porcelain("\u{0}garbled");
        let _ = parse_branch_list("???");
        let _ = parse_numstat("not\tenough");
        let _ = parse_log_oneline("");
        let _ = parse_name_only("\n\n\n");
    }
}
