//! Named resource registry
//!
//! A generic map from a unique, non-empty name to a handle, guarded by one
//! mutex. Hooks fire on insertion and removal so a specialization can attach
//! and detach per-entry bookkeeping (see [`crate::manager`]).
//!
//! # Locking
//!
//! The lock is never held while anything that can re-enter the registry
//! runs. `close_all` drains the map under the lock and hands entries to the
//! caller's closure afterwards; `free` drops handles after releasing it.
//! Hooks are the exception: they run under the lock and must not call back
//! into the registry.

pub mod error;
pub mod hooks;
pub mod store;

pub use error::RegistryError;
pub use hooks::{NoHooks, RegistryHooks};
pub use store::Registry;
