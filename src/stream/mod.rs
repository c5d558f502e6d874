//! Managed stream capability
//!
//! The manager reaches streams only through [`ManagedStream`]: a stable
//! name, the current state, a close request, and a state-change signal.
//! Whatever a stream does internally stays behind that trait.

pub mod packet;
pub mod signal;
pub mod state;

pub use packet::{CloseMode, PacketStream};
pub use signal::{ListenerId, SlotId, StateCallback, StateSignal};
pub use state::StreamState;

/// A long-lived stream that can be registered with a
/// [`StreamManager`](crate::manager::StreamManager)
///
/// Implementations must emit on [`state_change`](Self::state_change) exactly
/// once per transition, synchronously on the thread performing it, and must
/// not emit again after reaching [`StreamState::Closed`].
///
/// `Drop` must not re-enter the manager. A caller-owned stream dropped by its
/// owner while the manager briefly holds it can be destroyed with the
/// registry lock held, and that lock is not reentrant.
pub trait ManagedStream: Send + Sync + Sized + 'static {
    /// Stable, non-empty name
    fn name(&self) -> &str;

    /// Current lifecycle state
    fn state(&self) -> StreamState;

    /// Request the stream to close
    ///
    /// Closing may complete before this returns or later on another thread;
    /// either way it ends with a transition to [`StreamState::Closed`].
    fn close(&self);

    /// Signal emitted on every state transition
    fn state_change(&self) -> &StateSignal<Self>;
}
