//! Mapping root references and textual paths onto concrete root handles.
//!
//! Resolution never fails. Anything that cannot be resolved degrades to the
//! origin-private root, with a warning in the log.

use std::fmt;
use std::sync::Arc;

use crate::handle::DirHandle;
use crate::path;
use crate::registry::{RootRegistry, USER_MOUNT_ID, USER_PREFIX};

/// What the caller names as the root of an operation.
#[derive(Clone, Default)]
pub enum RootRef {
    /// No root given; the path alone decides.
    #[default]
    Default,
    /// A mount id or a registered prefix name, e.g. `"docs"` or `"/user"`.
    Id(String),
    /// An already-resolved handle, used as is.
    Handle(DirHandle),
}

impl fmt::Debug for RootRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootRef::Default => write!(f, "Default"),
            RootRef::Id(id) => f.debug_tuple("Id").field(id).finish(),
            RootRef::Handle(h) => f.debug_tuple("Handle").field(&h.identity()).finish(),
        }
    }
}

impl From<&str> for RootRef {
    fn from(id: &str) -> Self {
        if id.is_empty() {
            RootRef::Default
        } else {
            RootRef::Id(id.to_string())
        }
    }
}

impl From<String> for RootRef {
    fn from(id: String) -> Self {
        RootRef::from(id.as_str())
    }
}

impl From<DirHandle> for RootRef {
    fn from(handle: DirHandle) -> Self {
        RootRef::Handle(handle)
    }
}

impl From<&DirHandle> for RootRef {
    fn from(handle: &DirHandle) -> Self {
        RootRef::Handle(Arc::clone(handle))
    }
}

impl<T: Into<RootRef>> From<Option<T>> for RootRef {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// A root handle plus the path inside it.
#[derive(Clone)]
pub struct Resolved {
    pub root: DirHandle,
    /// Absolute, normalized, relative to `root`.
    pub path: String,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("root", &self.root.identity())
            .field("path", &self.path)
            .finish()
    }
}

/// Resolves root references against a [`RootRegistry`].
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<RootRegistry>,
}

impl PathResolver {
    pub fn new(registry: Arc<RootRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RootRegistry> {
        &self.registry
    }

    /// Resolve `root` and `rel_path` to a concrete handle and a path inside it.
    ///
    /// - `Handle` is returned unchanged.
    /// - `Id` is checked against the mount table first, then against the
    ///   prefix `/<id>/`. A leading `/<id>/` on the path is stripped.
    /// - `Default` stands for the user root. A mounted `user` root wins,
    ///   with a leading `/user/` stripped. Otherwise the path is matched
    ///   against the prefix table, longest prefix first, and the matched
    ///   prefix is stripped.
    pub fn resolve(&self, root: &RootRef, rel_path: &str) -> Resolved {
        let normalized = path::normalize("/", rel_path);
        match root {
            RootRef::Handle(handle) => Resolved {
                root: Arc::clone(handle),
                path: normalized,
            },
            RootRef::Id(reference) => {
                let id = path::root_id(reference);
                if id.is_empty() {
                    return self.resolve_default(&normalized);
                }
                let scoped = path::strip_scope(&normalized, id);
                Resolved {
                    root: self.resolve_id(id),
                    path: scoped,
                }
            }
            RootRef::Default => self.resolve_default(&normalized),
        }
    }

    /// Resolve just the root handle.
    pub fn resolve_root(&self, root: &RootRef, rel_path: &str) -> DirHandle {
        self.resolve(root, rel_path).root
    }

    fn resolve_id(&self, id: &str) -> DirHandle {
        if let Some(handle) = self.registry.mounted(id) {
            return handle;
        }

        let prefix = format!("/{}/", id);
        match self.registry.lookup(&prefix) {
            Some(resolve) => resolve().unwrap_or_else(|| {
                tracing::warn!(id, "root did not resolve, using origin root");
                self.origin()
            }),
            None => {
                tracing::debug!(id, "unknown root id, using origin root");
                self.origin()
            }
        }
    }

    fn resolve_default(&self, normalized: &str) -> Resolved {
        match self.registry.mounted(USER_MOUNT_ID) {
            Some(root) => Resolved {
                root,
                path: path::strip_scope(normalized, USER_MOUNT_ID),
            },
            None => self.resolve_by_prefix(normalized),
        }
    }

    fn resolve_by_prefix(&self, normalized: &str) -> Resolved {
        if let Some((spec, remainder)) = self.registry.longest_match(normalized) {
            if let Some(root) = (spec.resolve)() {
                return Resolved {
                    root,
                    path: remainder,
                };
            }
            tracing::warn!(prefix = %spec.prefix, "root did not resolve, using user root");
            return Resolved {
                root: self.user_root(),
                path: remainder,
            };
        }
        Resolved {
            root: self.user_root(),
            path: normalized.to_string(),
        }
    }

    fn user_root(&self) -> DirHandle {
        if let Some(root) = self.registry.mounted(USER_MOUNT_ID) {
            return root;
        }
        self.registry
            .lookup(USER_PREFIX)
            .and_then(|resolve| resolve())
            .unwrap_or_else(|| self.origin())
    }

    fn origin(&self) -> DirHandle {
        Arc::clone(self.registry.origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::memory::MemoryDirectory;

    fn resolver() -> PathResolver {
        let registry = RootRegistry::with_defaults(
            MemoryDirectory::root(),
            Arc::new(MemoryStore::new()),
        );
        PathResolver::new(Arc::new(registry))
    }

    fn origin_identity(r: &PathResolver) -> String {
        r.registry().origin().identity()
    }

    #[test]
    fn handle_is_returned_unchanged() {
        let r = resolver();
        let handle = MemoryDirectory::root();
        let resolved = r.resolve(&RootRef::from(&handle), "a/../b");
        assert_eq!(resolved.root.identity(), handle.identity());
        assert_eq!(resolved.path, "/b");
    }

    #[test]
    fn default_strips_matched_prefix() {
        let r = resolver();
        let resolved = r.resolve(&RootRef::Default, "/user/x/y.txt");
        assert_eq!(resolved.root.identity(), origin_identity(&r));
        assert_eq!(resolved.path, "/x/y.txt");

        let resolved = r.resolve(&RootRef::Default, "/plain");
        assert_eq!(resolved.path, "/plain");
    }

    #[test]
    fn unresolvable_prefix_degrades_to_user_root() {
        let r = resolver();
        let resolved = r.resolve(&RootRef::Default, "/assets/logo.png");
        assert_eq!(resolved.root.identity(), origin_identity(&r));
        assert_eq!(resolved.path, "/logo.png");
    }

    #[test]
    fn mounted_id_wins_then_falls_back_after_unmount() {
        let r = resolver();
        let docs = MemoryDirectory::root();
        r.registry().mount("docs", Arc::clone(&docs)).unwrap();

        let resolved = r.resolve(&RootRef::from("docs"), "/a.txt");
        assert_eq!(resolved.root.identity(), docs.identity());
        assert_eq!(resolved.path, "/a.txt");

        r.registry().unmount("docs").unwrap();
        let root = r.resolve_root(&RootRef::from("docs"), "/a.txt");
        assert_eq!(root.identity(), origin_identity(&r));
    }

    #[test]
    fn id_is_cleaned_and_scope_stripped() {
        let r = resolver();
        let docs = MemoryDirectory::root();
        r.registry().mount("docs", Arc::clone(&docs)).unwrap();

        let resolved = r.resolve(&RootRef::from("/docs/ignored"), "/docs/sub/a.txt");
        assert_eq!(resolved.root.identity(), docs.identity());
        assert_eq!(resolved.path, "/sub/a.txt");
    }

    #[test]
    fn id_falls_back_to_registered_prefix() {
        let r = resolver();
        let resolved = r.resolve(&RootRef::from("user"), "notes/today.md");
        assert_eq!(resolved.root.identity(), origin_identity(&r));
        assert_eq!(resolved.path, "/notes/today.md");

        let assets = r.resolve_root(&RootRef::from("assets"), "/x");
        assert_eq!(assets.identity(), origin_identity(&r));
    }

    #[test]
    fn default_prefers_mounted_user_root() {
        let r = resolver();
        let user = MemoryDirectory::root();
        r.registry().mount(USER_MOUNT_ID, Arc::clone(&user)).unwrap();

        let resolved = r.resolve(&RootRef::Default, "/a.txt");
        assert_eq!(resolved.root.identity(), user.identity());
        assert_eq!(resolved.path, "/a.txt");

        let resolved = r.resolve(&RootRef::from(""), "/user/notes/b.md");
        assert_eq!(resolved.root.identity(), user.identity());
        assert_eq!(resolved.path, "/notes/b.md");

        r.registry().unmount(USER_MOUNT_ID).unwrap();
        let resolved = r.resolve(&RootRef::Default, "/a.txt");
        assert_eq!(resolved.root.identity(), origin_identity(&r));
    }

    #[test]
    fn empty_and_missing_refs_use_default() {
        let r = resolver();
        assert!(matches!(RootRef::from(""), RootRef::Default));
        assert!(matches!(RootRef::from(None::<&str>), RootRef::Default));
        let resolved = r.resolve(&RootRef::from("/"), "/user/a");
        assert_eq!(resolved.path, "/a");
    }
}
