//! The live listing behind a directory view.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use originfs_core::HandleRef;
use tokio::sync::watch;

/// A shared, observable map of entry name to handle.
///
/// Clones share the same entries. Every mutation bumps a version counter
/// that [`Listing::subscribe`] receivers can wait on.
#[derive(Clone)]
pub struct Listing {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<BTreeMap<String, HandleRef>>,
    version: watch::Sender<u64>,
}

impl std::fmt::Debug for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listing")
            .field("keys", &self.keys())
            .field("version", &self.version())
            .finish()
    }
}

impl Default for Listing {
    fn default() -> Self {
        Self::new()
    }
}

impl Listing {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(BTreeMap::new()),
                version,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, HandleRef>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, HandleRef>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.inner.version.send_modify(|v| *v += 1);
    }

    pub fn get(&self, name: &str) -> Option<HandleRef> {
        self.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<HandleRef> {
        self.read().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, HandleRef)> {
        self.read()
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }

    /// Insert unless `name` is already present. Returns whether it inserted.
    pub fn add_if_absent(&self, name: &str, handle: HandleRef) -> bool {
        let inserted = {
            let mut entries = self.write();
            if entries.contains_key(name) {
                false
            } else {
                entries.insert(name.to_string(), handle);
                true
            }
        };
        if inserted {
            self.bump();
        }
        inserted
    }

    /// Insert or replace.
    pub fn upsert(&self, name: &str, handle: HandleRef) {
        self.write().insert(name.to_string(), handle);
        self.bump();
    }

    pub fn remove(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        if removed {
            self.bump();
        }
        removed
    }

    /// Replace the whole listing with `entries`.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (String, HandleRef)>) {
        let fresh: BTreeMap<_, _> = entries.into_iter().collect();
        *self.write() = fresh;
        self.bump();
    }

    /// Current version. Starts at 0 and grows with every mutation.
    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// True if both listings share the same entries.
    pub fn ptr_eq(&self, other: &Listing) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
