//! Observer capability for passthrough lifecycle events
//!
//! The engine holds the observer weakly: a dropped observer silently stops
//! receiving events and never keeps the engine from running.

use crate::Direction;
use std::sync::{Arc, Mutex, Weak};

/// Callbacks for passthrough lifecycle and traffic events.
///
/// Every method has a no-op default, so implementors only override what
/// they care about.
pub trait PassthroughObserver: Send + Sync {
    /// The local endpoint was acquired.
    fn connected_to_local(&self) {}

    /// The local endpoint was lost or torn down.
    fn disconnected_from_local(&self) {}

    /// The remote endpoint was acquired.
    fn connected_to_remote(&self) {}

    /// The remote endpoint was lost or torn down.
    fn disconnected_from_remote(&self) {}

    /// Bytes relayed local -> remote during the last rate window.
    fn bytes_local_to_remote(&self, _count: u64) {}

    /// Bytes relayed remote -> local during the last rate window.
    fn bytes_remote_to_local(&self, _count: u64) {}
}

/// Fire-and-forget event dispatcher over a weak observer reference.
pub(crate) struct EventNotifier {
    observer: Mutex<Option<Weak<dyn PassthroughObserver>>>,
}

impl EventNotifier {
    pub(crate) fn new() -> Self {
        Self {
            observer: Mutex::new(None),
        }
    }

    pub(crate) fn set_observer(&self, observer: &Arc<dyn PassthroughObserver>) {
        let mut slot = self.observer.lock().unwrap();
        *slot = Some(Arc::downgrade(observer));
    }

    fn notify(&self, event: impl FnOnce(&dyn PassthroughObserver)) {
        let observer = {
            let slot = self.observer.lock().unwrap();
            slot.as_ref().and_then(Weak::upgrade)
        };
        if let Some(observer) = observer {
            event(observer.as_ref());
        }
    }

    pub(crate) fn connected(&self, direction: Direction) {
        self.notify(|observer| match direction {
            Direction::LocalToRemote => observer.connected_to_local(),
            Direction::RemoteToLocal => observer.connected_to_remote(),
        });
    }

    pub(crate) fn disconnected(&self, direction: Direction) {
        self.notify(|observer| match direction {
            Direction::LocalToRemote => observer.disconnected_from_local(),
            Direction::RemoteToLocal => observer.disconnected_from_remote(),
        });
    }

    pub(crate) fn bytes_transferred(&self, direction: Direction, count: u64) {
        self.notify(|observer| match direction {
            Direction::LocalToRemote => observer.bytes_local_to_remote(count),
            Direction::RemoteToLocal => observer.bytes_remote_to_local(count),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        connected: AtomicUsize,
        bytes: AtomicUsize,
    }

    impl PassthroughObserver for CountingObserver {
        fn connected_to_local(&self) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }

        fn bytes_remote_to_local(&self, count: u64) {
            self.bytes.fetch_add(count as usize, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_events_reach_live_observer() {
        let notifier = EventNotifier::new();
        let observer = Arc::new(CountingObserver::default());
        let as_dyn: Arc<dyn PassthroughObserver> = observer.clone();
        notifier.set_observer(&as_dyn);

        notifier.connected(Direction::LocalToRemote);
        notifier.bytes_transferred(Direction::RemoteToLocal, 42);

        assert_eq!(observer.connected.load(Ordering::SeqCst), 1);
        assert_eq!(observer.bytes.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_unimplemented_callbacks_are_noops() {
        let notifier = EventNotifier::new();
        let observer = Arc::new(CountingObserver::default());
        let as_dyn: Arc<dyn PassthroughObserver> = observer.clone();
        notifier.set_observer(&as_dyn);

        // CountingObserver does not override these; nothing should happen.
        notifier.disconnected(Direction::LocalToRemote);
        notifier.connected(Direction::RemoteToLocal);
        assert_eq!(observer.connected.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_observer_is_silent() {
        let notifier = EventNotifier::new();
        notifier.connected(Direction::LocalToRemote);
        notifier.bytes_transferred(Direction::LocalToRemote, 1);
    }

    #[test]
    fn test_dropped_observer_is_silent() {
        let notifier = EventNotifier::new();
        let observer = Arc::new(CountingObserver::default());
        let as_dyn: Arc<dyn PassthroughObserver> = observer.clone();
        notifier.set_observer(&as_dyn);

        drop(as_dyn);
        drop(observer);

        notifier.connected(Direction::LocalToRemote);
        notifier.disconnected(Direction::RemoteToLocal);
    }
}
