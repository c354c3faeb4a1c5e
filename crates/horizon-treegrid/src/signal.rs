//! Synchronous signal/slot primitive.
//!
//! Signals are the notification mechanism used throughout the crate: backing
//! collections emit structural changes through a signal, and the selection
//! model publishes its aggregated selection changes through one.
//!
//! Slots are invoked directly on the emitting thread. The selection model is a
//! single-threaded cooperative component, so no queued or cross-thread
//! delivery exists here; a slot runs to completion before `emit` returns.
//!
//! # Example
//!
//! ```
//! use horizon_treegrid::Signal;
//!
//! let changed = Signal::<String>::new();
//!
//! let conn = changed.connect(|text| {
//!     println!("changed to {text}");
//! });
//!
//! changed.emit(&"hello".to_string());
//! changed.disconnect(conn);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Identifier for a signal-slot connection.
    ///
    /// Returned by [`Signal::connect`]; pass it to [`Signal::disconnect`] to
    /// remove the connection. Guaranteed unsubscription on this token is what
    /// the selection tree relies on when a node is detached.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal with synchronously invoked slots.
///
/// `Args` is the payload passed (by reference) to every connected slot. Use a
/// tuple for multiple arguments.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Creates a signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connects a slot and returns its connection ID.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnects a slot by ID.
    ///
    /// Returns `true` if the connection existed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Returns the number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Invokes every connected slot with `args`.
    ///
    /// The connection lock is not held while slots run, so a slot may connect
    /// or disconnect on this same signal. Slots added during emission are not
    /// invoked for the current emission.
    pub fn emit(&self, args: &Args) {
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        for slot in slots {
            slot(args);
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_connect_and_emit() {
        let signal = Signal::<i32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t = total.clone();
        signal.connect(move |value| {
            t.fetch_add(*value as usize, Ordering::SeqCst);
        });

        signal.emit(&3);
        signal.emit(&4);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_disconnect() {
        let signal = Signal::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let conn = signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(&());
        assert!(signal.disconnect(conn));
        assert!(!signal.disconnect(conn));
        signal.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_disconnect_from_slot_does_not_deadlock() {
        let signal = Arc::new(Signal::<()>::new());
        let inner = signal.clone();

        let conn = Arc::new(Mutex::new(None::<ConnectionId>));
        let stored = conn.clone();
        let id = signal.connect(move |_| {
            if let Some(id) = stored.lock().take() {
                inner.disconnect(id);
            }
        });
        *conn.lock() = Some(id);

        signal.emit(&());
        assert_eq!(signal.connection_count(), 0);
    }
}
