//! A cooperative cancellation flag shared across threads.
//!
//! Cloning gives every holder a handle to the same underlying flag; setting
//! it from any clone is visible to all others. Checked between scheduler
//! waves and polled by [`crate::command::CommandExecutor::run`] while a
//! child process is in flight, the way `Repository::run_command_delayed_stream`
//! already polls `try_wait()` in a loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Arms `signal` (SIGINT/SIGTERM) so delivery sets this token's flag
    /// directly, the same `Arc<AtomicBool>` handoff `signal_hook::flag`
    /// exists for — no signal-handler-side logic beyond the store.
    #[cfg(unix)]
    pub fn register_signal(&self, signal: i32) -> std::io::Result<()> {
        signal_hook::flag::register(signal, self.flag.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
