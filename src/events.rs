//! The typed event bus.
//!
//! A fixed schema of topic -> payload, subscribers registering by topic and
//! receiving an unsubscribe token. Emission is synchronous: a handler that
//! wants to avoid blocking the emitting thread must queue the event itself
//! (e.g. onto a channel) rather than relying on the bus to do it — the
//! scheduler's worker threads do exactly this, relaying events to the
//! orchestrating thread over a `crossbeam_channel` before calling
//! `EventBus::emit` there.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PipelineStart { run_id: String },
    PipelineComplete { run_id: String },
    PipelinePhaseStart { run_id: String, phase: String },
    PipelinePhaseComplete { run_id: String, phase: String },
    PipelinePhaseError { run_id: String, phase: String, error: String },

    TaskStart { task_id: String },
    TaskProgress { task_id: String, message: String },
    TaskComplete { task_id: String, success: bool },
    TaskError { task_id: String, error: String },

    EngineStart { task_id: String },
    EngineStreaming { task_id: String, chunk: String },
    EngineComplete { task_id: String },
    EngineError { task_id: String, error: String },

    GitWorktreeCreate { task_id: String, path: String, branch: String },
    GitWorktreeCleanup { task_id: String, path: String, left_in_place: bool },
    GitBranchCreate { branch: String },
    GitMergeStart { source: String, target: String },
    GitMergeComplete { source: String, target: String, commit: String },
    GitMergeConflict { source: String, target: String, files: Vec<String> },
    GitRebaseStart { source: String, target: String },
    GitRebaseComplete { source: String, target: String },
    GitRebaseConflict { source: String, target: String },
}

pub type SubscriptionId = u64;

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Returns a token for [`EventBus::unsubscribe`].
    /// Subscribers are untrusted: a handler that panics is caught so it
    /// cannot take down the run, but its panic is logged.
    pub fn subscribe(&self, handler: impl Fn(&Event) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("event bus mutex poisoned")
            .push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers
            .lock()
            .expect("event bus mutex poisoned")
            .retain(|(existing, _)| *existing != id);
    }

    /// Dispatch `event` to every subscriber, synchronously, in registration
    /// order. A handler panic is caught and logged rather than propagated.
    pub fn emit(&self, event: Event) {
        let handlers = self.handlers.lock().expect("event bus mutex poisoned");
        for (id, handler) in handlers.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&event)));
            if result.is_err() {
                log::warn!("event handler {id} panicked while handling {event:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(Event::TaskStart {
            task_id: "t1".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_handler_stops_receiving() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe(id);
        bus.emit(Event::TaskStart {
            task_id: "t1".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_other_handlers() {
        let bus = EventBus::new();
        bus.subscribe(|_event| panic!("boom"));
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(Event::TaskStart {
            task_id: "t1".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
