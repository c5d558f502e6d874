//! State-change signal
//!
//! An explicit, priority-ordered observer list attached to each stream.
//! Slots run in this order:
//!
//! 1. regular slots, highest priority first, ties in connection order;
//! 2. slots connected with [`StateSignal::connect_last`], in connection order.
//!
//! Emission copies the slot list and releases the signal lock before calling
//! out, so a callback may connect, disconnect, or re-enter a registry that
//! holds this stream.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::state::StreamState;

/// Callback invoked with `(sender, new_state, old_state)`
pub type StateCallback<S> = Arc<dyn Fn(&S, StreamState, StreamState) + Send + Sync>;

/// Identity of an observer, used to disconnect all of its slots at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a process-unique listener ID
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle for a single connected slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

struct Slot<S> {
    id: SlotId,
    owner: ListenerId,
    priority: i32,
    last: bool,
    callback: StateCallback<S>,
}

impl<S> Slot<S> {
    fn order_key(&self) -> (bool, Reverse<i32>) {
        (self.last, Reverse(self.priority))
    }
}

/// Observer list for stream state transitions
pub struct StateSignal<S> {
    slots: Mutex<Vec<Slot<S>>>,
    next_slot: AtomicU64,
}

impl<S> StateSignal<S> {
    /// Create a signal with no slots
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_slot: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Slot<S>>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn insert(
        &self,
        owner: ListenerId,
        priority: i32,
        last: bool,
        callback: StateCallback<S>,
    ) -> SlotId {
        let id = SlotId(self.next_slot.fetch_add(1, Ordering::Relaxed));
        let slot = Slot {
            id,
            owner,
            priority,
            last,
            callback,
        };

        let mut slots = self.lock();
        let key = slot.order_key();
        let pos = slots
            .iter()
            .position(|s| s.order_key() > key)
            .unwrap_or(slots.len());
        slots.insert(pos, slot);
        id
    }

    /// Connect a callback with the given priority (higher runs first)
    pub fn connect<F>(&self, owner: ListenerId, priority: i32, callback: F) -> SlotId
    where
        F: Fn(&S, StreamState, StreamState) + Send + Sync + 'static,
    {
        self.insert(owner, priority, false, Arc::new(callback))
    }

    /// Connect a callback that runs after every regular slot
    pub fn connect_last<F>(&self, owner: ListenerId, callback: F) -> SlotId
    where
        F: Fn(&S, StreamState, StreamState) + Send + Sync + 'static,
    {
        self.insert(owner, 0, true, Arc::new(callback))
    }

    /// Disconnect a single slot
    ///
    /// Returns `false` if the slot was already disconnected.
    pub fn disconnect(&self, slot: SlotId) -> bool {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|s| s.id != slot);
        slots.len() != before
    }

    /// Disconnect every slot owned by `owner`
    ///
    /// Returns the number of slots removed; calling it again is a no-op.
    pub fn disconnect_owner(&self, owner: ListenerId) -> usize {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|s| s.owner != owner);
        before - slots.len()
    }

    /// Check whether `owner` has any connected slot
    pub fn is_connected(&self, owner: ListenerId) -> bool {
        self.lock().iter().any(|s| s.owner == owner)
    }

    /// Get the number of connected slots
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether no slot is connected
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invoke every slot with `(sender, new_state, old_state)`
    ///
    /// Runs synchronously on the calling thread. A slot disconnected by an
    /// earlier slot during the same emission is skipped.
    pub fn emit(&self, sender: &S, new_state: StreamState, old_state: StreamState) {
        let snapshot: Vec<(SlotId, StateCallback<S>)> = self
            .lock()
            .iter()
            .map(|s| (s.id, Arc::clone(&s.callback)))
            .collect();

        for (id, callback) in snapshot {
            let connected = self.lock().iter().any(|s| s.id == id);
            if connected {
                callback(sender, new_state, old_state);
            }
        }
    }
}

impl<S> Default for StateSignal<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for StateSignal<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSignal")
            .field("slots", &self.len())
            .finish()
    }
}
