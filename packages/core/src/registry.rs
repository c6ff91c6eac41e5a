//! The root registry.
//!
//! Holds two tables:
//! - static prefix bindings (`"/"`, `"/user/"`, `"/assets/"`), each with a
//!   resolver closure producing the root handle on demand
//! - the runtime mount table of external roots keyed by a short id
//!
//! The list of mounted ids is mirrored to a [`KeyValueStore`] under
//! [`MOUNTED_KEY`] so a restarted process knows what used to be mounted.
//! Handles themselves are capabilities and are never persisted; a restored
//! id needs a fresh grant before it resolves again.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::handle::DirHandle;
use crate::kv::KeyValueStore;
use crate::prefix_table::PrefixTable;

/// Key under which the mounted id list is persisted.
pub const MOUNTED_KEY: &str = "opfs.mounted";

/// Mount id of the canonical user root.
pub const USER_MOUNT_ID: &str = "user";

/// Prefix bound to the origin-private root.
pub const ROOT_PREFIX: &str = "/";

/// Prefix of the canonical user root.
pub const USER_PREFIX: &str = "/user/";

/// Prefix reserved for backend-provided assets.
pub const ASSETS_PREFIX: &str = "/assets/";

/// Produces the root handle for a prefix, or `None` if it cannot.
pub type RootResolver = Arc<dyn Fn() -> Option<DirHandle> + Send + Sync>;

/// One static prefix binding.
#[derive(Clone)]
pub struct RootSpec {
    pub prefix: String,
    pub resolve: RootResolver,
}

impl fmt::Debug for RootSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSpec")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// A mounted external root.
#[derive(Debug, Clone)]
pub struct MountEntry {
    pub id: String,
    pub handle: DirHandle,
}

/// Root prefix table plus the mutable mount overlay.
pub struct RootRegistry {
    origin: DirHandle,
    roots: RwLock<PrefixTable<RootSpec>>,
    mounts: RwLock<BTreeMap<String, DirHandle>>,
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for RootRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootRegistry")
            .field("origin", &self.origin.identity())
            .field("prefixes", &self.prefixes())
            .field("mounts", &self.mounted_ids())
            .finish()
    }
}

impl RootRegistry {
    /// Create a registry with only the `"/"` binding to `origin`.
    pub fn new(origin: DirHandle, store: Arc<dyn KeyValueStore>) -> Self {
        let registry = Self {
            origin: Arc::clone(&origin),
            roots: RwLock::new(PrefixTable::new()),
            mounts: RwLock::new(BTreeMap::new()),
            store,
        };
        registry.register(ROOT_PREFIX, move || Some(Arc::clone(&origin)));
        registry
    }

    /// Create a registry with the standard prefix table.
    ///
    /// `"/"` and `"/user/"` both resolve to `origin`. `"/assets/"` is
    /// reserved and resolves to nothing.
    pub fn with_defaults(origin: DirHandle, store: Arc<dyn KeyValueStore>) -> Self {
        let registry = Self::new(Arc::clone(&origin), store);
        registry.register(USER_PREFIX, move || Some(Arc::clone(&origin)));
        registry.register(ASSETS_PREFIX, || {
            tracing::warn!(prefix = ASSETS_PREFIX, "asset root is not available");
            None
        });
        registry
    }

    /// The origin-private root. Every failed resolution ends up here.
    pub fn origin(&self) -> &DirHandle {
        &self.origin
    }

    /// Bind a prefix to a resolver, replacing any previous binding.
    pub fn register<F>(&self, prefix: &str, resolve: F)
    where
        F: Fn() -> Option<DirHandle> + Send + Sync + 'static,
    {
        let spec = RootSpec {
            prefix: prefix.to_string(),
            resolve: Arc::new(resolve),
        };
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        if roots.insert(prefix, spec).is_some() {
            tracing::debug!(prefix, "replaced root binding");
        }
    }

    /// The resolver bound to exactly this prefix.
    pub fn lookup(&self, prefix: &str) -> Option<RootResolver> {
        let roots = self.roots.read().unwrap_or_else(PoisonError::into_inner);
        roots.get(prefix).map(|spec| Arc::clone(&spec.resolve))
    }

    /// The longest registered prefix of `path`, its resolver, and the part
    /// of the path below it.
    pub fn longest_match(&self, path: &str) -> Option<(RootSpec, String)> {
        let roots = self.roots.read().unwrap_or_else(PoisonError::into_inner);
        roots
            .longest_match(path)
            .map(|m| (m.value.clone(), m.remainder))
    }

    /// All registered prefixes.
    pub fn prefixes(&self) -> Vec<String> {
        let roots = self.roots.read().unwrap_or_else(PoisonError::into_inner);
        roots.prefixes().into_iter().map(str::to_string).collect()
    }

    /// Mount `handle` under `id`.
    ///
    /// The in-memory mount is applied first and stays valid for the session
    /// even when persisting the id list fails; the error is returned so the
    /// caller can decide whether to surface it.
    pub fn mount(&self, id: &str, handle: DirHandle) -> Result<()> {
        {
            let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
            mounts.insert(id.to_string(), handle);
        }
        tracing::debug!(id, "mounted root");
        self.persist(None)
    }

    /// Remove a mount. Returns whether anything was mounted under `id`.
    pub fn unmount(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
            mounts.remove(id).is_some()
        };
        if removed {
            tracing::debug!(id, "unmounted root");
            self.persist(Some(id))?;
        }
        Ok(removed)
    }

    /// The handle mounted under `id`, if any.
    pub fn mounted(&self, id: &str) -> Option<DirHandle> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts.get(id).cloned()
    }

    /// Ids mounted in this session.
    pub fn mounted_ids(&self) -> Vec<String> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts.keys().cloned().collect()
    }

    /// Mounts in this session, with their handles.
    pub fn mounts(&self) -> Vec<MountEntry> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts
            .iter()
            .map(|(id, handle)| MountEntry {
                id: id.clone(),
                handle: Arc::clone(handle),
            })
            .collect()
    }

    /// Ids recorded in durable storage. A missing or unreadable list is
    /// treated as empty.
    pub fn persisted_ids(&self) -> Vec<String> {
        let raw = match self.store.get(MOUNTED_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read mounted id list");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed mounted id list");
                Vec::new()
            }
        }
    }

    /// Ids persisted by an earlier session that have no handle yet.
    pub fn pending_ids(&self) -> Vec<String> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        self.persisted_ids()
            .into_iter()
            .filter(|id| !mounts.contains_key(id))
            .collect()
    }

    /// Write the id list: this session's mounts plus ids still waiting for
    /// a grant, minus `removed`.
    fn persist(&self, removed: Option<&str>) -> Result<()> {
        let mut ids = self.mounted_ids();
        for id in self.pending_ids() {
            if !ids.contains(&id) && Some(id.as_str()) != removed {
                ids.push(id);
            }
        }
        ids.sort();
        let value = serde_json::to_string(&ids)?;
        self.store.set(MOUNTED_KEY, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use crate::kv::MemoryStore;
    use crate::memory::MemoryDirectory;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(FsError::Persist {
                message: "offline".to_string(),
            })
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(FsError::Persist {
                message: "offline".to_string(),
            })
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn registry() -> (RootRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = RootRegistry::with_defaults(MemoryDirectory::root(), store.clone());
        (registry, store)
    }

    #[test]
    fn default_prefixes() {
        let (registry, _) = registry();
        assert_eq!(registry.prefixes(), vec!["/", "/assets/", "/user/"]);

        let user = registry.lookup(USER_PREFIX).unwrap()().unwrap();
        assert_eq!(user.identity(), registry.origin().identity());
        assert!(registry.lookup(ASSETS_PREFIX).unwrap()().is_none());
    }

    #[test]
    fn longest_match_prefers_user_prefix() {
        let (registry, _) = registry();
        let (spec, rest) = registry.longest_match("/user/x").unwrap();
        assert_eq!(spec.prefix, "/user/");
        assert_eq!(rest, "/x");
    }

    #[test]
    fn mount_persists_id_list() {
        let (registry, store) = registry();
        registry.mount("docs", MemoryDirectory::root()).unwrap();
        registry.mount("art", MemoryDirectory::root()).unwrap();

        assert_eq!(
            store.get(MOUNTED_KEY).unwrap().as_deref(),
            Some(r#"["art","docs"]"#)
        );
        assert_eq!(registry.persisted_ids(), vec!["art", "docs"]);

        assert!(registry.unmount("docs").unwrap());
        assert!(!registry.unmount("docs").unwrap());
        assert_eq!(registry.persisted_ids(), vec!["art"]);
    }

    #[test]
    fn persisted_ids_survive_a_new_registry() {
        let store = Arc::new(MemoryStore::new());
        let first = RootRegistry::with_defaults(MemoryDirectory::root(), store.clone());
        first.mount("docs", MemoryDirectory::root()).unwrap();

        let second = RootRegistry::with_defaults(MemoryDirectory::root(), store.clone());
        assert!(second.mounted("docs").is_none());
        assert_eq!(second.pending_ids(), vec!["docs"]);

        second.mount("other", MemoryDirectory::root()).unwrap();
        assert_eq!(second.persisted_ids(), vec!["docs", "other"]);
    }

    #[test]
    fn persistence_failure_keeps_the_mount() {
        let registry = RootRegistry::with_defaults(MemoryDirectory::root(), Arc::new(BrokenStore));
        let handle = MemoryDirectory::root();
        let identity = handle.identity();

        assert!(registry.mount("docs", handle).is_err());
        assert_eq!(registry.mounted("docs").unwrap().identity(), identity);
        assert!(registry.persisted_ids().is_empty());
    }

    #[test]
    fn malformed_list_is_empty() {
        let (registry, store) = registry();
        store.set(MOUNTED_KEY, "{oops").unwrap();
        assert!(registry.persisted_ids().is_empty());
    }
}
