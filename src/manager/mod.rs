//! Stream manager
//!
//! Specializes the [`Registry`](crate::registry::Registry) for streams: a
//! stream is subscribed when it is added, unsubscribed when it leaves, and
//! removed automatically when it reports `Closed`.
//!
//! # Architecture
//!
//! ```text
//!                          StreamManager<S, P>
//!                     ┌─────────────────────────┐
//!                     │ registry: BTreeMap<     │
//!                     │   name, P::Handle       │
//!                     │ >  (one Mutex)          │
//!                     │ on_add:    connect_last │
//!                     │ on_remove: disconnect   │
//!                     └───────────▲─────────────┘
//!                                 │ free_if / remove_if
//!                                 │ (lock taken here, not held above)
//!    [Stream thread]              │
//!    stream.close()               │
//!         │                       │
//!         └──► state_change.emit(Closed)
//!                 ├─► user observers (by priority)
//!                 └─► manager slot (always last)
//! ```
//!
//! # Re-entrancy
//!
//! Closing a stream synchronously re-enters the manager through the
//! notification path. The registry lock is therefore never held while a
//! stream is closed: `close_stream` looks the stream up and releases the lock
//! before calling `close()`, and `close_all` drains the map before closing
//! anything.
//!
//! Stream destructors get the same treatment where the manager controls
//! them: `free_stream` and the close handler drop the released stream after
//! the lock is gone. A caller-owned stream can still lose its last owner
//! while a hook holds it, so [`ManagedStream`](crate::stream::ManagedStream)
//! implementations must not re-enter the manager from `Drop`.
//!
//! # Ownership
//!
//! The policy type parameter decides who releases a closed stream:
//! [`Owned`] managers hold the owning `Arc` and drop it on close,
//! [`Unowned`] managers hold a `Weak` and leave the stream to its owner.

pub mod config;
pub mod ownership;
pub mod streams;

pub use config::ManagerConfig;
pub use ownership::{Owned, Ownership, Unowned};
pub use streams::{OwningStreamManager, StreamManager, TrackingStreamManager};
