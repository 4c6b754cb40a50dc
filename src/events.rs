//! Coalescing event bus connecting the reader and UI threads to the searcher.
//!
//! The bus retains only the most recent payload per event kind between
//! pickups; the searcher atomically takes and clears the whole pending map.
//! A monotonically increasing key serial doubles as the cancellation signal
//! for in-flight match passes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::types::QuerySnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The query text or cursor changed.
    Key,
    /// The reader appended lines to the pending buffer.
    NewLines,
    /// The reader reached end of input. Delivered at most once.
    Loaded,
    /// A worker thread failed; the UI must restore the screen and re-raise.
    WorkerFailed,
    /// Stop the searcher thread. Sent when the UI loop exits.
    Shutdown,
}

#[derive(Clone, Debug)]
pub enum Event {
    Key(QuerySnapshot),
    NewLines,
    Loaded,
    WorkerFailed(String),
    Shutdown,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Key(_) => EventKind::Key,
            Event::NewLines => EventKind::NewLines,
            Event::Loaded => EventKind::Loaded,
            Event::WorkerFailed(_) => EventKind::WorkerFailed,
            Event::Shutdown => EventKind::Shutdown,
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    pending: Mutex<HashMap<EventKind, Event>>,
    available: Condvar,
    key_serial: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish an event, replacing any pending event of the same kind.
    pub fn emit(&self, event: Event) {
        if matches!(event, Event::Key(_)) {
            self.key_serial.fetch_add(1, Ordering::Release);
        }
        let mut pending = self.pending.lock().expect("event bus poisoned");
        pending.insert(event.kind(), event);
        self.available.notify_one();
    }

    /// Block until at least one event is pending, then take the whole map.
    pub fn take(&self) -> HashMap<EventKind, Event> {
        let mut pending = self.pending.lock().expect("event bus poisoned");
        while pending.is_empty() {
            pending = self
                .available
                .wait(pending)
                .expect("event bus poisoned");
        }
        std::mem::take(&mut *pending)
    }

    /// Like [`EventBus::take`] but gives up after `timeout`, returning an
    /// empty map. For consumers that cannot block indefinitely.
    pub fn take_timeout(&self, timeout: Duration) -> HashMap<EventKind, Event> {
        let mut pending = self.pending.lock().expect("event bus poisoned");
        if pending.is_empty() {
            let (guard, _) = self
                .available
                .wait_timeout(pending, timeout)
                .expect("event bus poisoned");
            pending = guard;
        }
        std::mem::take(&mut *pending)
    }

    /// A token tied to the current key serial; it reports cancellation once
    /// any fresher `key` event has been emitted.
    pub fn cancel_token(self: &Arc<Self>) -> CancelToken {
        CancelToken {
            bus: Arc::clone(self),
            seen: self.key_serial.load(Ordering::Acquire),
        }
    }
}

/// Cancellation token handed to the match pass. Checked at batch boundaries
/// and every few hundred lines so keystrokes pre-empt long scans.
#[derive(Clone)]
pub struct CancelToken {
    bus: Arc<EventBus>,
    seen: u64,
}

impl CancelToken {
    pub fn cancelled(&self) -> bool {
        self.bus.key_serial.load(Ordering::Acquire) != self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_coalesce_per_kind() {
        let bus = EventBus::new();
        bus.emit(Event::Key(QuerySnapshot::new("a")));
        bus.emit(Event::Key(QuerySnapshot::new("ab")));
        bus.emit(Event::NewLines);

        let taken = bus.take();
        assert_eq!(taken.len(), 2);
        match taken.get(&EventKind::Key) {
            Some(Event::Key(snapshot)) => assert_eq!(snapshot.text, "ab"),
            other => panic!("unexpected pending key event: {other:?}"),
        }
    }

    #[test]
    fn take_clears_the_pending_map() {
        let bus = EventBus::new();
        bus.emit(Event::Loaded);
        assert_eq!(bus.take().len(), 1);
        assert!(bus.take_timeout(Duration::from_millis(1)).is_empty());
    }

    #[test]
    fn fresh_key_event_cancels_outstanding_token() {
        let bus = EventBus::new();
        let token = bus.cancel_token();
        assert!(!token.cancelled());

        bus.emit(Event::NewLines);
        assert!(!token.cancelled());

        bus.emit(Event::Key(QuerySnapshot::new("q")));
        assert!(token.cancelled());
    }

    #[test]
    fn take_wakes_on_emit_from_another_thread() {
        let bus = EventBus::new();
        let producer = Arc::clone(&bus);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            producer.emit(Event::Loaded);
        });
        let taken = bus.take();
        assert!(taken.contains_key(&EventKind::Loaded));
        handle.join().unwrap();
    }
}
