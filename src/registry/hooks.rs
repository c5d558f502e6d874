//! Lifecycle hooks invoked by the registry
//!
//! Hooks run while the registry lock is held. They must not call back into
//! the registry that invoked them.

/// Callbacks fired when entries enter or leave a [`Registry`](super::Registry)
pub trait RegistryHooks<H>: Send + Sync {
    /// Called after `handle` has been inserted under `name`
    fn on_add(&self, _name: &str, _handle: &H) {}

    /// Called before the entry under `name` is erased
    fn on_remove(&self, _name: &str, _handle: &H) {}
}

/// Hooks that do nothing, for plain registries
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<H> RegistryHooks<H> for NoHooks {}
