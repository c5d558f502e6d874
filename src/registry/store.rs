//! Registry implementation
//!
//! A name-keyed map of handles behind a single mutex, with lifecycle hooks
//! fired on insertion and removal.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::error::{RegistryError, Result};
use super::hooks::{NoHooks, RegistryHooks};

/// Thread-safe registry of named handles
///
/// Every operation takes the lock for the duration of its map access only.
/// Anything that may call back into the registry (closing a stream, dropping
/// a freed handle) happens after the guard is released.
///
/// Entries are kept sorted by name, so snapshots, [`first`](Self::first) and
/// [`close_all`](Self::close_all) iterate in a stable order.
pub struct Registry<H, K = NoHooks> {
    /// Map of entry name to handle
    entries: Mutex<BTreeMap<String, H>>,

    /// Lifecycle hooks
    hooks: K,

    /// Name used in log output
    label: String,
}

impl<H> Registry<H, NoHooks> {
    /// Create an empty registry without hooks
    pub fn new() -> Self {
        Self::with_hooks("Registry", NoHooks)
    }
}

impl<H> Default for Registry<H, NoHooks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, K: RegistryHooks<H>> Registry<H, K> {
    /// Create an empty registry with the given hooks
    pub fn with_hooks(label: impl Into<String>, hooks: K) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            hooks,
            label: label.into(),
        }
    }

    /// Get the label used in log output
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the hooks
    pub fn hooks(&self) -> &K {
        &self.hooks
    }

    /// Acquire the map lock
    ///
    /// A panic inside a hook poisons the mutex but leaves the map consistent
    /// (hooks never see a half-applied mutation), so the poison is cleared.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, H>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert a handle under `name`
    ///
    /// Fails with [`RegistryError::AlreadyExists`] when the name is taken;
    /// the existing entry is never overwritten. The `on_add` hook runs before
    /// this returns, with the lock held.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn try_add(&self, name: &str, handle: H) -> Result<()> {
        assert!(!name.is_empty(), "registry entry name must not be empty");

        let mut entries = self.lock();
        match entries.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(name.to_owned())),
            Entry::Vacant(slot) => {
                let handle = slot.insert(handle);
                self.hooks.on_add(name, handle);

                tracing::debug!(
                    registry = %self.label,
                    name = name,
                    entries = entries.len(),
                    "Entry added"
                );
                Ok(())
            }
        }
    }

    /// Insert a handle under `name`, returning `false` if the name is taken
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn add(&self, name: &str, handle: H) -> bool {
        match self.try_add(name, handle) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(registry = %self.label, error = %err, "Add rejected");
                false
            }
        }
    }

    /// Remove the entry under `name` if `pred` accepts its handle
    ///
    /// The `on_remove` hook runs before the entry is erased. The handle is
    /// handed back to the caller, never dropped here.
    pub fn remove_if(&self, name: &str, pred: impl FnOnce(&H) -> bool) -> Option<H> {
        let mut entries = self.lock();

        let handle = entries.get(name).filter(|&handle| pred(handle))?;
        self.hooks.on_remove(name, handle);
        let handle = entries.remove(name);

        tracing::debug!(
            registry = %self.label,
            name = name,
            entries = entries.len(),
            "Entry removed"
        );
        handle
    }

    /// Remove the entry under `name`, returning its handle to the caller
    pub fn remove(&self, name: &str) -> Option<H> {
        self.remove_if(name, |_| true)
    }

    /// Remove the entry under `name`, failing if it is absent
    pub fn try_remove(&self, name: &str) -> Result<H> {
        self.remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }

    /// Remove the entry under `name` if `pred` accepts it, and drop the handle
    ///
    /// The handle is dropped after the lock is released.
    pub fn free_if(&self, name: &str, pred: impl FnOnce(&H) -> bool) -> bool {
        match self.remove_if(name, pred) {
            Some(handle) => {
                drop(handle);
                true
            }
            None => false,
        }
    }

    /// Remove the entry under `name` and drop the handle
    ///
    /// Returns `false` if nothing was registered under `name`.
    pub fn free(&self, name: &str) -> bool {
        self.free_if(name, |_| true)
    }

    /// Tear down every entry
    ///
    /// The map is drained and `on_remove` fires for each entry while the lock
    /// is held. `close` is then called for each drained entry in name order
    /// with the lock released, so it may re-enter the registry.
    pub fn close_all(&self, mut close: impl FnMut(&str, H)) {
        let drained = {
            let mut entries = self.lock();
            let drained = std::mem::take(&mut *entries);
            for (name, handle) in &drained {
                self.hooks.on_remove(name, handle);
            }
            drained
        };

        tracing::debug!(
            registry = %self.label,
            count = drained.len(),
            "Closing all entries"
        );

        for (name, handle) in drained {
            close(name.as_str(), handle);
        }
    }

    /// Drop every entry for which `keep` returns `false`
    ///
    /// Returns the number of entries removed. `on_remove` fires for each of
    /// them; their handles are dropped with the lock held.
    pub fn retain(&self, mut keep: impl FnMut(&str, &H) -> bool) -> usize {
        let mut entries = self.lock();
        let before = entries.len();

        entries.retain(|name, handle| {
            let kept = keep(name.as_str(), &*handle);
            if !kept {
                self.hooks.on_remove(name, handle);
            }
            kept
        });

        before - entries.len()
    }

    /// Check whether an entry is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get the registered names in order
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

impl<H: Clone, K: RegistryHooks<H>> Registry<H, K> {
    /// Get a copy of the handle under `name`
    pub fn get(&self, name: &str) -> Option<H> {
        self.lock().get(name).cloned()
    }

    /// Get a copy of the handle under `name`, failing if it is absent
    pub fn try_get(&self, name: &str) -> Result<H> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }

    /// Get the first entry in name order
    pub fn first(&self) -> Option<(String, H)> {
        self.lock()
            .iter()
            .next()
            .map(|(name, handle)| (name.clone(), handle.clone()))
    }

    /// Copy the current map
    ///
    /// The copy is detached from the registry; iterating it holds no lock.
    pub fn snapshot(&self) -> BTreeMap<String, H> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Hooks that record every call
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RegistryHooks<u32> for Recorder {
        fn on_add(&self, name: &str, handle: &u32) {
            self.events.lock().unwrap().push(format!("add {}={}", name, handle));
        }

        fn on_remove(&self, name: &str, handle: &u32) {
            self.events
                .lock()
                .unwrap()
                .push(format!("remove {}={}", name, handle));
        }
    }

    #[test]
    fn test_add_and_get() {
        let registry = Registry::new();

        assert!(registry.add("a", 1u32));
        assert_eq!(registry.get("a"), Some(1));
        assert_eq!(registry.get("b"), None);
        assert_eq!(
            registry.try_get("b"),
            Err(RegistryError::NotFound("b".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = Registry::new();

        assert!(registry.add("a", 1u32));
        assert!(!registry.add("a", 2));
        assert_eq!(
            registry.try_add("a", 3),
            Err(RegistryError::AlreadyExists("a".into()))
        );

        // First value is kept
        assert_eq!(registry.get("a"), Some(1));
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_name_panics() {
        let registry = Registry::new();
        registry.add("", 1u32);
    }

    #[test]
    fn test_hooks_fire() {
        let registry: Registry<u32, Recorder> = Registry::with_hooks("test", Recorder::default());

        registry.add("a", 1);
        registry.add("a", 2);
        registry.remove("a");
        registry.remove("a");

        assert_eq!(registry.hooks().events(), vec!["add a=1", "remove a=1"]);
    }

    #[test]
    fn test_remove_returns_handle() {
        let registry = Registry::new();
        registry.add("a", 7u32);

        assert_eq!(registry.remove("a"), Some(7));
        assert!(!registry.contains("a"));
        assert_eq!(registry.remove("a"), None);
        assert!(registry.try_remove("a").is_err());
    }

    #[test]
    fn test_remove_if_checks_handle() {
        let registry = Registry::new();
        registry.add("a", 7u32);

        assert_eq!(registry.remove_if("a", |h| *h == 8), None);
        assert!(registry.contains("a"));
        assert_eq!(registry.remove_if("a", |h| *h == 7), Some(7));
    }

    #[test]
    fn test_free_drops_handle() {
        let registry = Registry::new();
        let value = Arc::new(());
        registry.add("a", Arc::clone(&value));
        assert_eq!(Arc::strong_count(&value), 2);

        assert!(registry.free("a"));
        assert_eq!(Arc::strong_count(&value), 1);
        assert!(!registry.free("a"));
    }

    #[test]
    fn test_close_all_drains_in_order() {
        let registry: Registry<u32, Recorder> = Registry::with_hooks("test", Recorder::default());
        registry.add("b", 2);
        registry.add("a", 1);

        let mut closed = Vec::new();
        registry.close_all(|name, handle| closed.push((name.to_owned(), handle)));

        assert_eq!(closed, vec![("a".to_owned(), 1), ("b".to_owned(), 2)]);
        assert!(registry.is_empty());
        assert_eq!(
            registry.hooks().events(),
            vec!["add b=2", "add a=1", "remove a=1", "remove b=2"]
        );
    }

    #[test]
    fn test_close_all_may_reenter() {
        let registry = Registry::new();
        registry.add("a", 1u32);

        // Would deadlock if the lock were still held
        registry.close_all(|name, _| {
            assert!(!registry.contains(name));
            registry.add("late", 9);
        });

        assert_eq!(registry.names(), vec!["late"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = Registry::new();
        registry.add("a", 1u32);

        let snapshot = registry.snapshot();
        registry.add("b", 2);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_first_in_name_order() {
        let registry = Registry::new();
        assert_eq!(registry.first(), None);

        registry.add("zeta", 1u32);
        registry.add("alpha", 2);

        assert_eq!(registry.first(), Some(("alpha".to_owned(), 2)));
    }

    #[test]
    fn test_retain_fires_remove_hook() {
        let registry: Registry<u32, Recorder> = Registry::with_hooks("test", Recorder::default());
        registry.add("a", 1);
        registry.add("b", 2);

        let removed = registry.retain(|_, handle| *handle != 1);

        assert_eq!(removed, 1);
        assert_eq!(registry.names(), vec!["b"]);
        assert!(registry.hooks().events().contains(&"remove a=1".to_owned()));
    }

    #[test]
    fn test_panicking_hook_does_not_leak_lock() {
        struct Exploding;

        impl RegistryHooks<u32> for Exploding {
            fn on_add(&self, name: &str, _handle: &u32) {
                if name == "boom" {
                    panic!("hook failure");
                }
            }
        }

        let registry: Arc<Registry<u32, Exploding>> =
            Arc::new(Registry::with_hooks("test", Exploding));
        let cloned = Arc::clone(&registry);
        let result = std::thread::spawn(move || cloned.add("boom", 1)).join();
        assert!(result.is_err());

        // Insertion is not rolled back, and the lock is usable again
        assert!(registry.contains("boom"));
        assert!(registry.add("ok", 2));
    }
}
