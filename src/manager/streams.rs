//! Stream manager implementation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::registry::error::{RegistryError, Result};
use crate::registry::{Registry, RegistryHooks};
use crate::stream::{ListenerId, ManagedStream, StreamState};

use super::config::ManagerConfig;
use super::ownership::{Owned, Ownership, Unowned};

/// Stream manager that frees streams when they close
pub type OwningStreamManager<S> = StreamManager<S, Owned>;

/// Stream manager that only unregisters streams when they close
pub type TrackingStreamManager<S> = StreamManager<S, Unowned>;

/// Registry of named streams with automatic cleanup on close
///
/// Every registered stream carries one slot of the manager on its
/// state-change signal, connected after all other observers. When the
/// stream reports [`StreamState::Closed`] the slot removes it from the
/// registry, and under the [`Owned`] policy releases it.
///
/// Dropping the manager closes every stream still registered.
pub struct StreamManager<S: ManagedStream, P: Ownership<S> = Owned> {
    shared: Arc<Shared<S, P>>,
}

/// State reachable from the close notification path
struct Shared<S: ManagedStream, P: Ownership<S>> {
    /// Streams by name
    registry: Registry<P::Handle, StreamHooks<S, P>>,

    /// Identity of the manager's slots on stream signals
    listener: ListenerId,

    /// Configuration
    config: ManagerConfig,

    /// Closed streams that could not be found for cleanup
    faults: AtomicU64,
}

/// Subscribes to streams entering the registry and unsubscribes on removal
struct StreamHooks<S: ManagedStream, P: Ownership<S>> {
    listener: ListenerId,
    manager: Weak<Shared<S, P>>,
}

impl<S: ManagedStream, P: Ownership<S>> RegistryHooks<P::Handle> for StreamHooks<S, P> {
    fn on_add(&self, name: &str, handle: &P::Handle) {
        let Some(stream) = P::access(handle) else {
            return;
        };
        assert!(!stream.name().is_empty(), "stream name must not be empty");

        // Connected last so every other observer sees the transition before
        // the stream can be released.
        let manager = self.manager.clone();
        stream
            .state_change()
            .connect_last(self.listener, move |sender, new_state, old_state| {
                if let Some(shared) = manager.upgrade() {
                    shared.on_stream_state_change(sender, new_state, old_state);
                }
            });

        tracing::debug!(stream = name, "Stream added");
    }

    fn on_remove(&self, name: &str, handle: &P::Handle) {
        if let Some(stream) = P::access(handle) {
            stream.state_change().disconnect_owner(self.listener);
        }

        tracing::debug!(stream = name, "Stream removed");
    }
}

impl<S: ManagedStream, P: Ownership<S>> Shared<S, P> {
    fn on_stream_state_change(
        &self,
        stream: &S,
        new_state: StreamState,
        old_state: StreamState,
    ) {
        tracing::debug!(
            manager = %self.config.label,
            stream = stream.name(),
            from = %old_state,
            to = %new_state,
            "Stream state change"
        );

        if !new_state.is_terminal() {
            return;
        }

        let name = stream.name();
        if self.reclaim(stream) {
            return;
        }

        // Not registered. If the slot was already detached, the stream left
        // through close_all/removal or this is a repeated Closed; otherwise
        // the slot outlived its entry.
        if stream.state_change().disconnect_owner(self.listener) == 0 {
            tracing::warn!(
                manager = %self.config.label,
                stream = name,
                "Closed stream already removed"
            );
        } else {
            self.consistency_fault(name);
        }
    }

    /// Remove a closed stream, freeing it under [`Owned`]
    ///
    /// Only the entry that refers to `stream` is touched. Removal detaches
    /// the manager's slot through `on_remove`, under the registry lock.
    fn reclaim(&self, stream: &S) -> bool {
        let name = stream.name();
        if P::FREES_CLOSED {
            tracing::debug!(stream = name, "On stream close: freeing");
            self.registry
                .free_if(name, |handle| P::refers_to(handle, stream))
        } else {
            tracing::debug!(stream = name, "On stream close: removing");
            self.registry
                .remove_if(name, |handle| P::refers_to(handle, stream))
                .is_some()
        }
    }

    fn consistency_fault(&self, name: &str) {
        let faults = self.faults.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(
            manager = %self.config.label,
            stream = name,
            faults = faults,
            "Cannot remove closed stream"
        );

        if self.config.panic_on_inconsistency {
            panic!("closed stream {:?} is not registered", name);
        }
    }
}

impl<S: ManagedStream, P: Ownership<S>> StreamManager<S, P> {
    /// Create a stream manager with default configuration
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Create a stream manager with custom configuration
    pub fn with_config(config: ManagerConfig) -> Self {
        let listener = ListenerId::next();
        let shared = Arc::new_cyclic(|manager| Shared {
            registry: Registry::with_hooks(
                config.label.clone(),
                StreamHooks {
                    listener,
                    manager: manager.clone(),
                },
            ),
            listener,
            config,
            faults: AtomicU64::new(0),
        });

        Self { shared }
    }

    /// Get the configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Whether closed streams are released by the manager
    pub fn frees_closed_streams(&self) -> bool {
        P::FREES_CLOSED
    }

    /// Number of closed streams that could not be found for cleanup
    pub fn consistency_faults(&self) -> u64 {
        self.shared.faults.load(Ordering::Relaxed)
    }

    fn insert(&self, stream: &Arc<S>, handle: P::Handle) -> Result<()> {
        assert!(!stream.name().is_empty(), "stream name must not be empty");
        self.shared.registry.try_add(stream.name(), handle)?;

        // A stream that closed before the slot was connected never notifies
        // the manager. The slot is connected by now, so if both this check
        // and the notification fire, the later removal finds nothing.
        if stream.state().is_terminal() && self.shared.reclaim(stream) {
            tracing::warn!(
                manager = %self.shared.config.label,
                stream = stream.name(),
                "Stream closed before it was added"
            );
        }
        Ok(())
    }

    fn accept(&self, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(
                    manager = %self.shared.config.label,
                    error = %err,
                    "Add rejected"
                );
                false
            }
        }
    }

    /// Get a stream by name
    pub fn get_stream(&self, name: &str) -> Option<Arc<S>> {
        let handle = self.shared.registry.get(name)?;
        match P::access(&handle) {
            Some(stream) => Some(stream),
            None => {
                self.prune(name);
                None
            }
        }
    }

    /// Get a stream by name, failing if it is not registered
    pub fn try_get_stream(&self, name: &str) -> Result<Arc<S>> {
        self.get_stream(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }

    /// Request the named stream to close
    ///
    /// The stream leaves the registry when it reports `Closed`, which may be
    /// before or after this returns. Returns `false` if no such stream is
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn close_stream(&self, name: &str) -> bool {
        self.try_close_stream(name).is_ok()
    }

    /// Request the named stream to close, failing if it is not registered
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn try_close_stream(&self, name: &str) -> Result<()> {
        assert!(!name.is_empty(), "stream name must not be empty");

        tracing::debug!(
            manager = %self.shared.config.label,
            stream = name,
            "Close stream"
        );
        // The registry lock is released here; close() may re-enter it
        let stream = self.try_get_stream(name)?;
        stream.close();
        Ok(())
    }

    /// Unregister the named stream without closing it
    ///
    /// The manager's slot is disconnected, so closing the stream later does
    /// not reach the manager. Under [`Owned`] the returned `Arc` is the last
    /// reference unless others are still held, which hands ownership back to
    /// the caller. Returns `None` if no live stream is registered.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn remove_stream(&self, name: &str) -> Option<Arc<S>> {
        self.try_remove_stream(name).ok()
    }

    /// Unregister the named stream without closing it, failing if it is not
    /// registered
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn try_remove_stream(&self, name: &str) -> Result<Arc<S>> {
        assert!(!name.is_empty(), "stream name must not be empty");

        // Holding the stream keeps its destructor out of the registry lock
        let stream = self.try_get_stream(name)?;
        self.shared
            .registry
            .remove_if(name, |handle| P::refers_to(handle, &stream))
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))?;

        tracing::debug!(
            manager = %self.shared.config.label,
            stream = name,
            "Stream unregistered"
        );
        Ok(stream)
    }

    /// Unregister the named stream without closing it and release the
    /// manager's reference
    ///
    /// Under [`Owned`] the stream is dropped here unless an access `Arc` is
    /// still held elsewhere. Returns `false` if no live stream is registered.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn free_stream(&self, name: &str) -> bool {
        assert!(!name.is_empty(), "stream name must not be empty");

        let Some(stream) = self.get_stream(name) else {
            return false;
        };
        let freed = self
            .shared
            .registry
            .free_if(name, |handle| P::refers_to(handle, &stream));

        if freed {
            tracing::debug!(
                manager = %self.shared.config.label,
                stream = name,
                "Stream freed"
            );
        }
        freed
    }

    /// Get the first live stream in name order
    pub fn default_stream(&self) -> Option<Arc<S>> {
        self.shared.registry.snapshot().values().find_map(P::access)
    }

    /// Copy the current set of live streams
    pub fn streams(&self) -> BTreeMap<String, Arc<S>> {
        self.shared
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|(name, handle)| P::access(&handle).map(|stream| (name, stream)))
            .collect()
    }

    /// Check whether a stream is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.shared.registry.contains(name)
    }

    /// Get the number of registered streams
    pub fn len(&self) -> usize {
        self.shared.registry.len()
    }

    /// Check whether no stream is registered
    pub fn is_empty(&self) -> bool {
        self.shared.registry.is_empty()
    }

    /// Get the registered names in order
    pub fn names(&self) -> Vec<String> {
        self.shared.registry.names()
    }

    /// Close and unregister every stream
    ///
    /// Streams are unsubscribed and erased under the lock, then closed in
    /// name order with the lock released. Under [`Owned`] each stream is
    /// released once its close request returns.
    pub fn close_all(&self) {
        tracing::debug!(
            manager = %self.shared.config.label,
            streams = self.len(),
            "Close all streams"
        );

        self.shared.registry.close_all(|name, handle| {
            match P::access(&handle) {
                Some(stream) => stream.close(),
                None => tracing::warn!(stream = name, "Stream dropped before close"),
            }
        });
    }

    /// Drop registry entries whose stream no longer exists
    ///
    /// Only [`Unowned`] managers can hold such entries: the caller dropped the
    /// stream without closing it. Returns the number of entries removed.
    pub fn prune_dropped(&self) -> usize {
        let pruned = self
            .shared
            .registry
            .retain(|_, handle| P::access(handle).is_some());
        if pruned > 0 {
            tracing::warn!(
                manager = %self.shared.config.label,
                pruned = pruned,
                "Pruned streams dropped while registered"
            );
        }
        pruned
    }

    fn prune(&self, name: &str) {
        if self
            .shared
            .registry
            .remove_if(name, |handle| P::access(handle).is_none())
            .is_some()
        {
            tracing::warn!(stream = name, "Pruned stream dropped while registered");
        }
    }
}

impl<S: ManagedStream> StreamManager<S, Owned> {
    /// Move a stream into the manager
    ///
    /// Returns shared access to the stream. The manager keeps the owning
    /// reference and releases it when the stream closes.
    ///
    /// # Panics
    ///
    /// Panics if the stream name is empty.
    pub fn try_add_stream(&self, stream: S) -> Result<Arc<S>> {
        let stream = Arc::new(stream);
        self.insert(&stream, Arc::clone(&stream))?;
        Ok(stream)
    }

    /// Move a stream into the manager, returning `false` if the name is taken
    ///
    /// # Panics
    ///
    /// Panics if the stream name is empty.
    pub fn add_stream(&self, stream: S) -> bool {
        let result = self.try_add_stream(stream).map(drop);
        self.accept(result)
    }
}

impl<S: ManagedStream> StreamManager<S, Unowned> {
    /// Register a caller-owned stream
    ///
    /// # Panics
    ///
    /// Panics if the stream name is empty.
    pub fn try_add_stream(&self, stream: &Arc<S>) -> Result<()> {
        self.insert(stream, Arc::downgrade(stream))
    }

    /// Register a caller-owned stream, returning `false` if the name is taken
    ///
    /// # Panics
    ///
    /// Panics if the stream name is empty.
    pub fn add_stream(&self, stream: &Arc<S>) -> bool {
        let result = self.try_add_stream(stream);
        self.accept(result)
    }
}

impl<S: ManagedStream, P: Ownership<S>> Default for StreamManager<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ManagedStream, P: Ownership<S>> Drop for StreamManager<S, P> {
    fn drop(&mut self) {
        tracing::debug!(manager = %self.shared.config.label, "Destroy");
        self.close_all();
    }
}

impl<S: ManagedStream, P: Ownership<S>> std::fmt::Display for StreamManager<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[", self.shared.config.label)?;
        for (name, stream) in self.streams() {
            write!(f, "\n\t{}: {}", name, stream.state())?;
        }
        write!(f, "\n]")
    }
}

impl<S: ManagedStream, P: Ownership<S>> std::fmt::Debug for StreamManager<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("label", &self.shared.config.label)
            .field("frees_closed_streams", &P::FREES_CLOSED)
            .field("streams", &self.names())
            .finish()
    }
}
