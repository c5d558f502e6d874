//! Ownership policies
//!
//! Who releases a stream once it closes is decided by a type parameter of
//! the manager, not a runtime flag:
//!
//! - [`Owned`]: the stream is moved into the manager, which holds the owning
//!   `Arc` and releases it when the stream closes.
//! - [`Unowned`]: the manager holds a `Weak` back-reference; the caller keeps
//!   ownership and the stream stays usable after it is unregistered.

use std::sync::{Arc, Weak};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Owned {}
    impl Sealed for super::Unowned {}
}

/// Ownership policy of a [`StreamManager`](super::StreamManager)
pub trait Ownership<S>: sealed::Sealed + Send + Sync + 'static {
    /// Handle stored in the registry
    type Handle: Clone + Send + Sync + 'static;

    /// Whether streams are released when they close
    const FREES_CLOSED: bool;

    /// Get shared access to the stream, if it is still alive
    fn access(handle: &Self::Handle) -> Option<Arc<S>>;

    /// Check whether `handle` refers to `stream`
    fn refers_to(handle: &Self::Handle, stream: &S) -> bool;
}

/// The manager owns its streams and frees them on close
#[derive(Debug, Clone, Copy, Default)]
pub struct Owned;

/// The caller owns the streams; the manager only unregisters them on close
#[derive(Debug, Clone, Copy, Default)]
pub struct Unowned;

impl<S: Send + Sync + 'static> Ownership<S> for Owned {
    type Handle = Arc<S>;

    const FREES_CLOSED: bool = true;

    fn access(handle: &Self::Handle) -> Option<Arc<S>> {
        Some(Arc::clone(handle))
    }

    fn refers_to(handle: &Self::Handle, stream: &S) -> bool {
        std::ptr::eq(Arc::as_ptr(handle), stream)
    }
}

impl<S: Send + Sync + 'static> Ownership<S> for Unowned {
    type Handle = Weak<S>;

    const FREES_CLOSED: bool = false;

    fn access(handle: &Self::Handle) -> Option<Arc<S>> {
        handle.upgrade()
    }

    fn refers_to(handle: &Self::Handle, stream: &S) -> bool {
        std::ptr::eq(handle.as_ptr(), stream)
    }
}
