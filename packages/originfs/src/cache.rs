//! Reference-counted cache of live directory listings.
//!
//! [`DirectoryCache::open`] returns a [`DirectoryView`] immediately. The
//! listing behind it fills in asynchronously from two producers: a
//! `readDirectory` round trip through the worker and a direct enumeration
//! of the directory handle. Both merge by name with add-if-absent, so the
//! order they land in does not matter. Afterwards the view stays current
//! through a change observation registered with the worker.
//!
//! Views opened for the same root and normalized path share one
//! [`DirectoryState`]. The cache counts open views per key and tears the
//! state down when the last one is disposed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use originfs_core::handle::walk_directory;
use originfs_core::{DirHandle, HandleRef, PathResolver, RootRef};
use originfs_worker::protocol::{Observe, ReadDirectory, Unobserve};
use originfs_worker::{ChangeEvent, ChannelError, OpKind, Reply, Request, Transfer, WorkerChannel};
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::listing::Listing;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identity of a cached directory: the root's identity plus the
/// normalized path inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub root: String,
    pub path: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.path)
    }
}

/// Options for [`DirectoryCache::open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Create the directory (and missing parents) if it does not exist.
    pub create: bool,
}

/// Shared state of one cached directory.
pub struct DirectoryState {
    key: CacheKey,
    root: DirHandle,
    path: String,
    create: AtomicBool,
    listing: Listing,
    observation_id: String,
    dir: Mutex<Option<DirHandle>>,
    /// Serializes handle acquisition.
    acquire: AsyncMutex<()>,
    hydrated: watch::Sender<bool>,
    /// Set once the cache has dropped this state.
    evicted: AtomicBool,
}

impl fmt::Debug for DirectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryState")
            .field("key", &self.key)
            .field("observation_id", &self.observation_id)
            .field("entries", &self.listing.len())
            .field("hydrated", &*self.hydrated.borrow())
            .finish()
    }
}

impl DirectoryState {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn observation_id(&self) -> &str {
        &self.observation_id
    }

    /// The directory handle, acquired on first use. `None` if it could not
    /// be acquired; a later call tries again.
    pub async fn directory(&self) -> Option<DirHandle> {
        let cached = lock(&self.dir).clone();
        if cached.is_some() {
            return cached;
        }

        let _acquiring = self.acquire.lock().await;
        let cached = lock(&self.dir).clone();
        if cached.is_some() {
            return cached;
        }
        let create = self.create.load(Ordering::Acquire);
        match walk_directory(&self.root, &self.path, create).await {
            Ok(dir) => {
                *lock(&self.dir) = Some(Arc::clone(&dir));
                Some(dir)
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "could not open directory");
                None
            }
        }
    }

    fn has_directory(&self) -> bool {
        lock(&self.dir).is_some()
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::SeqCst)
    }

    /// Apply a batch of change events in delivery order.
    pub fn apply_changes(self: &Arc<Self>, changes: &[ChangeEvent], runtime: &Handle) {
        for change in changes {
            if !change.kind.is_upsert() {
                self.listing.remove(&change.name);
                continue;
            }
            match &change.handle {
                Some(handle) => self.listing.upsert(&change.name, handle.clone()),
                None => {
                    let state = Arc::clone(self);
                    let name = change.name.clone();
                    runtime.spawn(async move { state.resolve_entry(&name).await });
                }
            }
        }
    }

    async fn resolve_entry(&self, name: &str) {
        let Some(dir) = self.directory().await else {
            return;
        };
        match dir.entry(name).await {
            Ok(Some(handle)) => self.listing.upsert(name, handle),
            Ok(None) => {
                self.listing.remove(name);
            }
            Err(e) => tracing::debug!(key = %self.key, name, error = %e, "could not resolve changed entry"),
        }
    }

    fn transfer(&self) -> (Transfer, String) {
        Transfer::root(&self.root)
    }

    async fn hydrate(self: Arc<Self>, channel: Arc<WorkerChannel>) {
        let Some(dir) = self.directory().await else {
            self.hydrated.send_replace(true);
            return;
        };
        if self.is_evicted() {
            self.hydrated.send_replace(true);
            return;
        }

        let (transfer, root_id) = self.transfer();
        let observe = Request::Observe(Observe {
            root_id: root_id.clone(),
            path: self.path.clone(),
            id: self.observation_id.clone(),
        });
        if let Err(e) = channel.request(observe, transfer.clone()).await {
            tracing::warn!(key = %self.key, error = %e, "could not observe directory");
        }
        if self.is_evicted() {
            // The eviction's unobserve may have reached the worker before
            // this observe did.
            tracing::debug!(key = %self.key, "evicted while observing");
            unobserve(&channel, &self.observation_id).await;
            self.hydrated.send_replace(true);
            return;
        }

        let snapshot = channel.request(
            Request::ReadDirectory(ReadDirectory {
                root_id,
                path: self.path.clone(),
                create: false,
            }),
            transfer,
        );
        let (snapshot, direct) = tokio::join!(snapshot, dir.entries());

        match direct {
            Ok(entries) => self.merge(entries),
            Err(e) => tracing::debug!(key = %self.key, error = %e, "direct enumeration failed"),
        }
        match snapshot {
            Ok(Reply::Entries(entries)) => self.merge(entries),
            Ok(_) => tracing::warn!(key = %self.key, "unexpected reply to readDirectory"),
            Err(e) => tracing::warn!(key = %self.key, error = %e, "worker hydration failed"),
        }

        tracing::debug!(key = %self.key, entries = self.listing.len(), "hydrated");
        self.hydrated.send_replace(true);
    }

    fn merge(&self, entries: Vec<(String, HandleRef)>) {
        for (name, handle) in entries {
            self.listing.add_if_absent(&name, handle);
        }
    }

    async fn wait_hydrated(&self) {
        let mut rx = self.hydrated.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|done| *done).await;
    }
}

async fn unobserve(channel: &WorkerChannel, id: &str) {
    let request = Request::Unobserve(Unobserve { id: id.to_string() });
    if let Err(e) = channel.request(request, Transfer::new()).await {
        tracing::debug!(error = %e, "unobserve failed");
    }
}

struct CacheEntry {
    state: Arc<DirectoryState>,
    refs: usize,
}

struct CacheInner {
    resolver: PathResolver,
    channel: Arc<WorkerChannel>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl CacheInner {
    /// Add a reference to `state`. False if it has already been evicted.
    fn retain(&self, state: &Arc<DirectoryState>) -> bool {
        match lock(&self.entries).get_mut(&state.key) {
            Some(entry) if Arc::ptr_eq(&entry.state, state) => {
                entry.refs += 1;
                true
            }
            _ => false,
        }
    }

    /// Drop one reference to `state`. Tears it down at zero.
    fn release(&self, state: &Arc<DirectoryState>) {
        let evicted = {
            let mut entries = lock(&self.entries);
            match entries.get_mut(&state.key) {
                Some(entry) if Arc::ptr_eq(&entry.state, state) => {
                    entry.refs -= 1;
                    if entry.refs == 0 {
                        entries.remove(&state.key);
                        state.evicted.store(true, Ordering::SeqCst);
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            }
        };
        if !evicted {
            return;
        }

        tracing::debug!(key = %state.key, "evicting directory");
        self.channel.observers().unregister(&state.observation_id);
        let channel = Arc::clone(&self.channel);
        let id = state.observation_id.clone();
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { unobserve(&channel, &id).await });
            }
            Err(_) => tracing::debug!(key = %state.key, "no runtime, skipping unobserve"),
        }
    }
}

/// The directory cache. Cheap to clone.
#[derive(Clone)]
pub struct DirectoryCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for DirectoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl DirectoryCache {
    pub fn new(resolver: PathResolver, channel: Arc<WorkerChannel>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                resolver,
                channel,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The key `root` and `path` resolve to.
    pub fn key_for(&self, root: &RootRef, path: &str) -> CacheKey {
        let resolved = self.inner.resolver.resolve(root, path);
        CacheKey {
            root: resolved.root.identity(),
            path: resolved.path,
        }
    }

    /// Open a live view of a directory.
    ///
    /// Returns at once; the listing fills in as hydration completes. A
    /// second open of the same directory shares the first one's state. If
    /// that state has no directory yet and this open asks for `create`, the
    /// directory is created and the listing hydrated again.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since hydration runs as a
    /// spawned task.
    pub fn open(&self, root: impl Into<RootRef>, path: &str, options: OpenOptions) -> DirectoryView {
        let resolved = self.inner.resolver.resolve(&root.into(), path);
        let key = CacheKey {
            root: resolved.root.identity(),
            path: resolved.path.clone(),
        };

        let (state, fresh) = {
            let mut entries = lock(&self.inner.entries);
            match entries.get_mut(&key) {
                Some(entry) => {
                    entry.refs += 1;
                    (Arc::clone(&entry.state), false)
                }
                None => {
                    let (hydrated, _) = watch::channel(false);
                    let state = Arc::new(DirectoryState {
                        key: key.clone(),
                        root: resolved.root,
                        path: resolved.path,
                        create: AtomicBool::new(options.create),
                        listing: Listing::new(),
                        observation_id: uuid::Uuid::new_v4().to_string(),
                        dir: Mutex::new(None),
                        acquire: AsyncMutex::new(()),
                        hydrated,
                        evicted: AtomicBool::new(false),
                    });
                    entries.insert(
                        key.clone(),
                        CacheEntry {
                            state: Arc::clone(&state),
                            refs: 1,
                        },
                    );
                    (state, true)
                }
            }
        };

        if fresh {
            tracing::debug!(%key, "opening directory");
            let runtime = Handle::current();
            let weak: Weak<DirectoryState> = Arc::downgrade(&state);
            let handler_runtime = runtime.clone();
            self.inner.channel.observers().register(
                state.observation_id.clone(),
                Arc::new(move |changes: &[ChangeEvent]| {
                    if let Some(state) = weak.upgrade() {
                        state.apply_changes(changes, &handler_runtime);
                    }
                }),
            );
            runtime.spawn(Arc::clone(&state).hydrate(Arc::clone(&self.inner.channel)));
        } else if options.create && !state.has_directory() {
            tracing::debug!(%key, "directory cache hit, creating directory");
            state.create.store(true, Ordering::Release);
            state.hydrated.send_replace(false);
            Handle::current().spawn(Arc::clone(&state).hydrate(Arc::clone(&self.inner.channel)));
        } else {
            tracing::debug!(%key, "directory cache hit");
        }

        DirectoryView {
            state,
            cache: Arc::clone(&self.inner),
            disposed: AtomicBool::new(false),
        }
    }

    /// Open views of `key`, or 0 if it is not cached.
    pub fn ref_count(&self, key: &CacheKey) -> usize {
        lock(&self.inner.entries)
            .get(key)
            .map_or(0, |entry| entry.refs)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.inner.entries).contains_key(key)
    }

    /// Number of cached directories.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live view of one directory.
///
/// Dropping the view disposes it. Cloning opens another reference to the
/// same state.
pub struct DirectoryView {
    state: Arc<DirectoryState>,
    cache: Arc<CacheInner>,
    disposed: AtomicBool,
}

impl fmt::Debug for DirectoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryView")
            .field("key", &self.state.key)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Clone for DirectoryView {
    fn clone(&self) -> Self {
        // A clone of a disposed view starts out disposed.
        let live = !self.is_disposed() && self.cache.retain(&self.state);
        Self {
            state: Arc::clone(&self.state),
            cache: Arc::clone(&self.cache),
            disposed: AtomicBool::new(!live),
        }
    }
}

impl Drop for DirectoryView {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl DirectoryView {
    pub fn key(&self) -> &CacheKey {
        &self.state.key
    }

    pub fn state(&self) -> &Arc<DirectoryState> {
        &self.state
    }

    pub fn listing(&self) -> &Listing {
        &self.state.listing
    }

    pub fn get(&self, name: &str) -> Option<HandleRef> {
        self.state.listing.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.state.listing.has(name)
    }

    pub fn len(&self) -> usize {
        self.state.listing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.listing.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.listing.keys()
    }

    pub fn values(&self) -> Vec<HandleRef> {
        self.state.listing.values()
    }

    pub fn entries(&self) -> Vec<(String, HandleRef)> {
        self.state.listing.entries()
    }

    /// Notified on every listing change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.state.listing.subscribe()
    }

    /// Wait for the initial hydration to finish.
    pub async fn ready(&self) {
        self.state.wait_hydrated().await;
    }

    /// Replace the listing with a fresh snapshot from the worker.
    ///
    /// Storage errors are logged and reported as `Ok(false)`; only channel
    /// failures are returned as errors.
    pub async fn refresh(&self) -> Result<bool, ChannelError> {
        let (transfer, root_id) = self.state.transfer();
        let request = Request::ReadDirectory(ReadDirectory {
            root_id,
            path: self.state.path.clone(),
            create: false,
        });
        match self.cache.channel.request(request, transfer).await {
            Ok(Reply::Entries(entries)) => {
                self.state.listing.replace_all(entries);
                Ok(true)
            }
            Ok(_) => Err(ChannelError::UnexpectedReply {
                op: OpKind::ReadDirectory,
            }),
            Err(ChannelError::Remote { error, .. }) => {
                tracing::warn!(key = %self.state.key, %error, "refresh failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The underlying directory handle, once acquired.
    pub async fn handle(&self) -> Option<DirHandle> {
        self.state.directory().await
    }

    /// Run `f` against the underlying directory handle.
    pub async fn invoke<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce(DirHandle) -> Fut,
        Fut: Future<Output = T>,
    {
        let dir = self.handle().await?;
        Some(f(dir).await)
    }

    /// Release this view. A second call is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cache.release(&self.state);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use originfs_core::{DirectoryHandle, FileRef, MemoryDirectory, MemoryStore, RootRegistry};
    use originfs_worker::{
        ChangeKind, ChannelConfig, DirectHandlers, HostContext, ObserverRegistry, ThreadSpawner,
        WorkerHost,
    };

    fn cache(origin: &DirHandle) -> DirectoryCache {
        let registry = RootRegistry::with_defaults(Arc::clone(origin), Arc::new(MemoryStore::new()));
        let config = ChannelConfig {
            host: HostContext {
                workers_supported: false,
                delegated: false,
            },
            ..ChannelConfig::default()
        };
        let channel = WorkerChannel::standard(config, Arc::new(ObserverRegistry::new()));
        DirectoryCache::new(PathResolver::new(Arc::new(registry)), Arc::new(channel))
    }

    #[tokio::test]
    async fn hydrates_from_existing_entries() {
        let origin = MemoryDirectory::root();
        origin.get_file("a.txt", true).await.unwrap();
        origin.get_directory("sub", true).await.unwrap();

        let cache = cache(&origin);
        let view = cache.open(RootRef::Default, "/", OpenOptions::default());
        view.ready().await;
        assert_eq!(view.keys(), vec!["a.txt", "sub"]);
        assert!(view.has("sub"));
        assert_eq!(
            view.get("a.txt").map(|h| h.kind()),
            Some(originfs_core::EntryKind::File)
        );
    }

    #[tokio::test]
    async fn same_key_shares_listing_and_counts_refs() {
        let origin = MemoryDirectory::root();
        let cache = cache(&origin);
        let a = cache.open(RootRef::Default, "/user/", OpenOptions::default());
        let b = cache.open(RootRef::Default, "/", OpenOptions::default());
        assert_eq!(a.key(), b.key());
        assert!(a.listing().ptr_eq(b.listing()));
        assert_eq!(cache.ref_count(a.key()), 2);

        let c = b.clone();
        assert_eq!(cache.ref_count(a.key()), 3);
        drop(c);
        assert_eq!(cache.ref_count(a.key()), 2);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_evicts_at_zero() {
        let origin = MemoryDirectory::root();
        let cache = cache(&origin);
        let a = cache.open(RootRef::Default, "/", OpenOptions::default());
        let b = cache.open(RootRef::Default, "/", OpenOptions::default());
        let key = a.key().clone();

        a.dispose();
        a.dispose();
        assert!(a.is_disposed());
        assert_eq!(cache.ref_count(&key), 1);

        b.dispose();
        assert!(!cache.contains(&key));
        assert!(cache.is_empty());
        drop(a);
        drop(b);
        assert_eq!(cache.ref_count(&key), 0);
    }

    #[tokio::test]
    async fn changes_merge_regardless_of_hydration_order() {
        let origin = MemoryDirectory::root();
        let existing = origin.get_file("seen.txt", true).await.unwrap();
        let cache = cache(&origin);
        let runtime = Handle::current();

        let early = cache.open(RootRef::Default, "/", OpenOptions::default());
        early.state().apply_changes(
            &[ChangeEvent::file("seen.txt", ChangeKind::Created, Arc::clone(&existing))],
            &runtime,
        );
        early.ready().await;

        let late_cache = DirectoryCache::new(
            PathResolver::new(Arc::new(RootRegistry::with_defaults(
                Arc::clone(&origin),
                Arc::new(MemoryStore::new()),
            ))),
            Arc::clone(&cache.inner.channel),
        );
        let late = late_cache.open(RootRef::Handle(Arc::clone(&origin)), "/", OpenOptions::default());
        late.ready().await;
        late.state().apply_changes(
            &[ChangeEvent::file("seen.txt", ChangeKind::Created, existing)],
            &runtime,
        );

        assert_eq!(early.keys(), late.keys());
        assert_eq!(early.keys(), vec!["seen.txt"]);
    }

    #[tokio::test]
    async fn deletions_remove_entries_and_notify() {
        let origin = MemoryDirectory::root();
        origin.get_file("gone.txt", true).await.unwrap();
        let cache = cache(&origin);
        let view = cache.open(RootRef::Default, "/", OpenOptions::default());
        view.ready().await;
        let mut rx = view.subscribe();
        rx.borrow_and_update();

        view.state().apply_changes(
            &[ChangeEvent::new("gone.txt", ChangeKind::Disappeared)],
            &Handle::current(),
        );
        assert!(view.is_empty());
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn missing_directory_resolves_empty() {
        let origin = MemoryDirectory::root();
        let cache = cache(&origin);
        let view = cache.open(RootRef::Default, "/nope", OpenOptions::default());
        view.ready().await;
        assert!(view.is_empty());
        assert!(view.handle().await.is_none());

        let created = cache.open(RootRef::Default, "/made", OpenOptions { create: true });
        created.ready().await;
        let name = created.invoke(|dir| async move { dir.name().to_string() }).await;
        assert_eq!(name.as_deref(), Some("made"));
    }

    #[tokio::test]
    async fn create_on_cache_hit_makes_the_directory() {
        let origin = MemoryDirectory::root();
        let cache = cache(&origin);
        let missing = cache.open(RootRef::Default, "/later", OpenOptions::default());
        missing.ready().await;
        assert!(missing.handle().await.is_none());

        let created = cache.open(RootRef::Default, "/later", OpenOptions { create: true });
        assert_eq!(created.key(), missing.key());
        created.ready().await;
        assert_eq!(created.handle().await.map(|dir| dir.name().to_string()).as_deref(), Some("later"));
        assert!(missing.handle().await.is_some());
        assert!(origin.get_directory("later", false).await.is_ok());
    }

    /// Delegates to a directory, but opening a child takes a while.
    #[derive(Debug)]
    struct SlowDirectory {
        inner: DirHandle,
        delay: Duration,
    }

    #[async_trait]
    impl DirectoryHandle for SlowDirectory {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn identity(&self) -> String {
            self.inner.identity()
        }

        async fn get_directory(&self, name: &str, create: bool) -> originfs_core::Result<DirHandle> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_directory(name, create).await
        }

        async fn get_file(&self, name: &str, create: bool) -> originfs_core::Result<FileRef> {
            self.inner.get_file(name, create).await
        }

        async fn entries(&self) -> originfs_core::Result<Vec<(String, HandleRef)>> {
            self.inner.entries().await
        }

        async fn remove_entry(&self, name: &str, recursive: bool) -> originfs_core::Result<()> {
            self.inner.remove_entry(name, recursive).await
        }
    }

    #[tokio::test]
    async fn dispose_during_hydration_leaves_no_observation() {
        let inner = MemoryDirectory::root();
        inner.get_directory("sub", true).await.unwrap();
        let origin: DirHandle = Arc::new(SlowDirectory {
            inner,
            delay: Duration::from_millis(100),
        });

        let host = Arc::new(WorkerHost::new(Arc::new(|_| {})));
        let config = ChannelConfig {
            host: HostContext {
                workers_supported: false,
                delegated: false,
            },
            ..ChannelConfig::default()
        };
        let channel = WorkerChannel::new(
            config,
            Arc::new(ThreadSpawner::default()),
            DirectHandlers::with_host(Arc::clone(&host)),
            Arc::new(ObserverRegistry::new()),
        );
        let registry = RootRegistry::with_defaults(Arc::clone(&origin), Arc::new(MemoryStore::new()));
        let cache = DirectoryCache::new(PathResolver::new(Arc::new(registry)), Arc::new(channel));

        let view = cache.open(RootRef::Default, "/sub", OpenOptions::default());
        let state = Arc::clone(view.state());
        drop(view);
        assert!(cache.is_empty());
        assert!(state.is_evicted());

        state.wait_hydrated().await;
        assert_eq!(host.observation_count(), 0);
    }
}
