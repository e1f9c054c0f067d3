//! Git error types.
//!
//! Mirrors the shape of `worktrunk::git::GitError`: a flat enum of the
//! failure kinds a caller needs to branch on, each carrying just enough
//! context to build a message. No ANSI styling here — this crate has no
//! interactive terminal surface, only structured results consumed by a
//! scheduler and logged via `log`.

use std::path::PathBuf;

#[derive(Debug)]
pub enum GitError {
    /// A git invocation exited non-zero; `stderr` is the raw git output.
    CommandFailed {
        command: String,
        args: Vec<String>,
        exit_code: Option<i32>,
        stderr: String,
    },
    /// A git invocation did not complete within its timeout.
    CommandTimeout { command: String, args: Vec<String> },
    /// `discovery_path` is not inside a git repository.
    NotARepository { path: PathBuf },
    /// A porcelain parser encountered input it could not make sense of.
    ///
    /// The porcelain parsers themselves are total and never raise this —
    /// it exists for callers that want to surface a decode failure for
    /// auxiliary, non-porcelain git output.
    ParseError(String),
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed {
                command,
                args,
                exit_code,
                stderr,
            } => {
                write!(
                    f,
                    "command failed: {command} {}{}: {}",
                    args.join(" "),
                    exit_code
                        .map(|c| format!(" (exit {c})"))
                        .unwrap_or_default(),
                    stderr.trim()
                )
            }
            GitError::CommandTimeout { command, args } => {
                write!(f, "command timed out: {command} {}", args.join(" "))
            }
            GitError::NotARepository { path } => {
                write!(f, "not a git repository: {}", path.display())
            }
            GitError::ParseError(msg) => write!(f, "failed to parse git output: {msg}"),
        }
    }
}

impl std::error::Error for GitError {}
