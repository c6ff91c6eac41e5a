//! The public filesystem facade.
//!
//! Every operation takes a root reference (mount id, handle or nothing) and
//! a path. Storage failures never escape: they are logged and turned into
//! `None` or `false`. Only failures of the worker channel itself reach the
//! caller, and only from the operations that go through it.

use std::sync::Arc;

use originfs_core::handle::{walk_directory, walk_entry, walk_file};
use originfs_core::{
    path, Bytes, DirHandle, FileRef, FsError, HandleRef, JsonFileStore, KeyValueStore,
    LocalDirectory, MemoryDirectory, MemoryStore, PathResolver, Resolved, RootRef, RootRegistry,
    USER_MOUNT_ID,
};
use originfs_worker::protocol::{CopyEntry, Mount, ReadFile, Remove, Unmount, WriteFile};
use originfs_worker::{
    ChannelConfig, ChannelError, FileContents, ObserverRegistry, OpKind, ReadKind, Reply, Request,
    Transfer, WorkerChannel,
};
use tokio::task::JoinHandle;

use crate::cache::{DirectoryCache, DirectoryView, OpenOptions};
use crate::config::FsConfig;

/// Transfer keys used by copy requests.
const FROM_KEY: &str = "from";
const TO_KEY: &str = "to";

/// What [`OriginFs::write_file`] writes.
#[derive(Debug, Clone)]
pub enum WriteData {
    Bytes(Bytes),
    Text(String),
    /// Copy this file's contents to the target path.
    File(FileRef),
    /// Copy this directory's contents into the directory at the target path.
    Directory(DirHandle),
}

impl From<Bytes> for WriteData {
    fn from(data: Bytes) -> Self {
        WriteData::Bytes(data)
    }
}

impl From<Vec<u8>> for WriteData {
    fn from(data: Vec<u8>) -> Self {
        WriteData::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for WriteData {
    fn from(data: &'static [u8]) -> Self {
        WriteData::Bytes(Bytes::from_static(data))
    }
}

impl From<String> for WriteData {
    fn from(text: String) -> Self {
        WriteData::Text(text)
    }
}

impl From<&str> for WriteData {
    fn from(text: &str) -> Self {
        WriteData::Text(text.to_string())
    }
}

impl From<FileRef> for WriteData {
    fn from(file: FileRef) -> Self {
        WriteData::File(file)
    }
}

impl From<DirHandle> for WriteData {
    fn from(dir: DirHandle) -> Self {
        WriteData::Directory(dir)
    }
}

/// Turn a storage failure into `fallback`, letting channel failures through.
fn swallow<T>(
    op: OpKind,
    path: &str,
    result: Result<T, ChannelError>,
    fallback: T,
) -> Result<T, ChannelError> {
    match result {
        Err(ChannelError::Remote { error, .. }) => {
            if error.not_found {
                tracing::debug!(%op, path, %error, "not found");
            } else {
                tracing::warn!(%op, path, %error, "operation failed");
            }
            Ok(fallback)
        }
        other => other,
    }
}

fn expect_done(op: OpKind, reply: Reply) -> Result<bool, ChannelError> {
    match reply {
        Reply::Done(done) => Ok(done),
        _ => Err(ChannelError::UnexpectedReply { op }),
    }
}

/// Virtual filesystem over the origin-private root and mounted roots.
#[derive(Debug, Clone)]
pub struct OriginFs {
    resolver: PathResolver,
    channel: Arc<WorkerChannel>,
    cache: DirectoryCache,
}

impl OriginFs {
    /// A filesystem over `origin`, persisting its mount list in `store`.
    pub fn new(origin: DirHandle, store: Arc<dyn KeyValueStore>, config: ChannelConfig) -> Self {
        let registry = Arc::new(RootRegistry::with_defaults(origin, store));
        let channel = WorkerChannel::standard(config, Arc::new(ObserverRegistry::new()));
        Self::with_channel(registry, Arc::new(channel))
    }

    /// A filesystem using an existing registry and channel.
    pub fn with_channel(registry: Arc<RootRegistry>, channel: Arc<WorkerChannel>) -> Self {
        let resolver = PathResolver::new(registry);
        let cache = DirectoryCache::new(resolver.clone(), Arc::clone(&channel));
        Self {
            resolver,
            channel,
            cache,
        }
    }

    /// An in-memory filesystem with default channel settings.
    pub fn in_memory() -> Self {
        Self::new(
            MemoryDirectory::root(),
            Arc::new(MemoryStore::new()),
            ChannelConfig::default(),
        )
    }

    /// Build a filesystem from `config`, re-granting its configured mounts.
    ///
    /// A configured mount whose directory cannot be opened is skipped with a
    /// warning.
    pub async fn from_config(config: &FsConfig) -> originfs_core::Result<Self> {
        let origin = match &config.origin_root {
            Some(dir) => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| FsError::from_io(e, dir.display().to_string()))?;
                LocalDirectory::open(dir)?
            }
            None => MemoryDirectory::root(),
        };
        let store: Arc<dyn KeyValueStore> = match &config.mount_store {
            Some(file) => Arc::new(JsonFileStore::new(file)),
            None => Arc::new(MemoryStore::new()),
        };

        let fs = Self::new(origin, store, config.channel.clone());
        for (id, dir) in &config.mounts {
            match LocalDirectory::open(dir) {
                Ok(handle) => fs.regrant(id, handle).await,
                Err(e) => tracing::warn!(id, dir = %dir.display(), error = %e, "skipping mount"),
            }
        }
        Ok(fs)
    }

    pub fn registry(&self) -> &Arc<RootRegistry> {
        self.resolver.registry()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn channel(&self) -> &Arc<WorkerChannel> {
        &self.channel
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Resolve a root reference and path.
    pub fn resolve(&self, root: impl Into<RootRef>, path: &str) -> Resolved {
        self.resolver.resolve(&root.into(), path)
    }

    /// The directory at `path`.
    ///
    /// A last segment that looks like a file name (`notes.txt`) is dropped,
    /// so passing a file path yields its parent directory.
    pub async fn get_directory_handle(
        &self,
        root: impl Into<RootRef>,
        path: &str,
        create: bool,
    ) -> Option<DirHandle> {
        let resolved = self.resolve(root, path);
        let dir_path = match path::split_parent(&resolved.path) {
            (parent, Some(last)) if path::looks_like_file(&last) => parent,
            _ => resolved.path,
        };
        match walk_directory(&resolved.root, &dir_path, create).await {
            Ok(dir) => Some(dir),
            Err(e) => {
                log_native(&e, &dir_path, "getDirectoryHandle");
                None
            }
        }
    }

    /// The file at `path`. Paths ending in a separator are never files.
    pub async fn get_file_handle(
        &self,
        root: impl Into<RootRef>,
        path: &str,
        create: bool,
    ) -> Option<FileRef> {
        if path.is_empty() || path.ends_with(path::SEPARATOR) {
            tracing::debug!(path, "not a file path");
            return None;
        }
        let resolved = self.resolve(root, path);
        match walk_file(&resolved.root, &resolved.path, create).await {
            Ok(file) => Some(file),
            Err(e) => {
                log_native(&e, &resolved.path, "getFileHandle");
                None
            }
        }
    }

    /// Read a file through the worker. `None` if it cannot be read.
    pub async fn read_file(
        &self,
        root: impl Into<RootRef>,
        path: &str,
        kind: ReadKind,
    ) -> Result<Option<FileContents>, ChannelError> {
        let resolved = self.resolve(root, path);
        let (transfer, root_id) = Transfer::root(&resolved.root);
        let request = Request::ReadFile(ReadFile {
            root_id,
            path: resolved.path.clone(),
            kind,
        });
        let reply = self.channel.request(request, transfer).await.map(Some);
        match swallow(OpKind::ReadFile, &resolved.path, reply, None)? {
            Some(Reply::Contents(contents)) => Ok(Some(contents)),
            Some(_) => Err(ChannelError::UnexpectedReply {
                op: OpKind::ReadFile,
            }),
            None => Ok(None),
        }
    }

    /// Read a file as UTF-8 text.
    pub async fn read_text(
        &self,
        root: impl Into<RootRef>,
        path: &str,
    ) -> Result<Option<String>, ChannelError> {
        Ok(self
            .read_file(root, path, ReadKind::Text)
            .await?
            .map(|contents| match contents {
                FileContents::Text(text) => text,
                other => String::from_utf8_lossy(&other.into_bytes()).into_owned(),
            }))
    }

    /// Write `data` to `path`, creating parent directories.
    ///
    /// File and directory handles are copied rather than written. Returns
    /// false if nothing was persisted.
    pub async fn write_file(
        &self,
        root: impl Into<RootRef>,
        path: &str,
        data: impl Into<WriteData>,
    ) -> Result<bool, ChannelError> {
        let root = root.into();
        let data = match data.into() {
            WriteData::Bytes(bytes) => bytes,
            WriteData::Text(text) => Bytes::from(text),
            WriteData::File(file) => {
                let Some(target) = self.get_file_handle(root, path, true).await else {
                    return Ok(false);
                };
                return self.copy(HandleRef::File(file), HandleRef::File(target)).await;
            }
            WriteData::Directory(dir) => {
                let resolved = self.resolve(root, path);
                let target = match walk_directory(&resolved.root, &resolved.path, true).await {
                    Ok(target) => target,
                    Err(e) => {
                        log_native(&e, &resolved.path, "writeFile");
                        return Ok(false);
                    }
                };
                return self
                    .copy(HandleRef::Directory(dir), HandleRef::Directory(target))
                    .await;
            }
        };

        let resolved = self.resolve(root, path);
        let (transfer, root_id) = Transfer::root(&resolved.root);
        let request = Request::WriteFile(WriteFile {
            root_id,
            path: resolved.path.clone(),
            data,
        });
        let done = self
            .channel
            .request(request, transfer)
            .await
            .and_then(|reply| expect_done(OpKind::WriteFile, reply));
        swallow(OpKind::WriteFile, &resolved.path, done, false)
    }

    /// Remove the entry at `path`, recursively.
    pub async fn remove(&self, root: impl Into<RootRef>, path: &str) -> Result<bool, ChannelError> {
        self.remove_with(root, path, true).await
    }

    pub async fn remove_file(
        &self,
        root: impl Into<RootRef>,
        path: &str,
    ) -> Result<bool, ChannelError> {
        self.remove_with(root, path, true).await
    }

    pub async fn remove_directory(
        &self,
        root: impl Into<RootRef>,
        path: &str,
    ) -> Result<bool, ChannelError> {
        self.remove_with(root, path, true).await
    }

    /// Remove the entry at `path`. A non-empty directory needs `recursive`.
    pub async fn remove_with(
        &self,
        root: impl Into<RootRef>,
        path: &str,
        recursive: bool,
    ) -> Result<bool, ChannelError> {
        let resolved = self.resolve(root, path);
        let (transfer, root_id) = Transfer::root(&resolved.root);
        let request = Request::Remove(Remove {
            root_id,
            path: resolved.path.clone(),
            recursive,
        });
        let done = self
            .channel
            .request(request, transfer)
            .await
            .and_then(|reply| expect_done(OpKind::Remove, reply));
        swallow(OpKind::Remove, &resolved.path, done, false)
    }

    /// Copy `from` into `to`.
    ///
    /// A file copied onto a directory lands in it under its own name; a
    /// directory copied onto a directory has its contents merged in.
    pub async fn copy(&self, from: HandleRef, to: HandleRef) -> Result<bool, ChannelError> {
        let label = format!("{} -> {}", from.name(), to.name());
        let mut transfer = Transfer::new();
        transfer.insert(FROM_KEY, from);
        transfer.insert(TO_KEY, to);
        let request = Request::Copy(CopyEntry {
            from: FROM_KEY.to_string(),
            to: TO_KEY.to_string(),
        });
        let done = self
            .channel
            .request(request, transfer)
            .await
            .and_then(|reply| expect_done(OpKind::Copy, reply));
        swallow(OpKind::Copy, &label, done, false)
    }

    /// Mount `handle` under `id`.
    ///
    /// The mount takes effect even if the mount list cannot be persisted.
    /// Mounting the user root seeds it with a copy of the origin-private
    /// root; the returned task completes when that copy is done.
    pub async fn mount(&self, id: &str, handle: DirHandle) -> Option<JoinHandle<bool>> {
        self.regrant(id, Arc::clone(&handle)).await;
        if id != USER_MOUNT_ID {
            return None;
        }

        let fs = self.clone();
        let origin = Arc::clone(self.registry().origin());
        Some(tokio::spawn(async move {
            match fs
                .copy(HandleRef::Directory(origin), HandleRef::Directory(handle))
                .await
            {
                Ok(done) => done,
                Err(e) => {
                    tracing::warn!(error = %e, "seeding user mount failed");
                    false
                }
            }
        }))
    }

    /// Bind `handle` to `id` without seeding it. Used to restore a mount
    /// recorded by an earlier session.
    pub async fn regrant(&self, id: &str, handle: DirHandle) {
        if let Err(e) = self.registry().mount(id, Arc::clone(&handle)) {
            tracing::warn!(id, error = %e, "could not persist mount list");
        }
        let (transfer, key) = Transfer::root(&handle);
        let request = Request::Mount(Mount {
            id: id.to_string(),
            handle: Some(key),
        });
        if let Err(e) = self.channel.request(request, transfer).await {
            tracing::debug!(id, error = %e, "worker did not record mount");
        }
    }

    /// Remove the mount `id`. Returns whether it was mounted.
    pub async fn unmount(&self, id: &str) -> bool {
        let removed = match self.registry().unmount(id) {
            Ok(removed) => removed,
            Err(e) => {
                // Persistence only runs after the in-memory removal.
                tracing::warn!(id, error = %e, "could not persist mount list");
                true
            }
        };
        if removed {
            let request = Request::Unmount(Unmount { id: id.to_string() });
            if let Err(e) = self.channel.request(request, Transfer::new()).await {
                tracing::debug!(id, error = %e, "worker did not drop mount");
            }
        }
        removed
    }

    /// Ids mounted in this session.
    pub fn mounts(&self) -> Vec<String> {
        self.registry().mounted_ids()
    }

    /// Ids mounted by an earlier session that need a fresh grant.
    pub fn pending_mounts(&self) -> Vec<String> {
        self.registry().pending_ids()
    }

    /// Open a live, cached view of a directory.
    pub fn open_directory(
        &self,
        root: impl Into<RootRef>,
        path: &str,
        options: OpenOptions,
    ) -> DirectoryView {
        self.cache.open(root, path, options)
    }

    /// The entry at `path`, file or directory, exactly as named. Unlike
    /// [`get_directory_handle`](Self::get_directory_handle) no segment is
    /// ever trimmed.
    pub async fn entry(&self, root: impl Into<RootRef>, path: &str) -> Option<HandleRef> {
        let resolved = self.resolve(root, path);
        match walk_entry(&resolved.root, &resolved.path).await {
            Ok(entry) => entry,
            Err(e) => {
                log_native(&e, &resolved.path, "entry");
                None
            }
        }
    }

    /// Whether anything exists at `path`.
    pub async fn exists(&self, root: impl Into<RootRef>, path: &str) -> bool {
        self.entry(root, path).await.is_some()
    }

    /// One-shot listing through the worker, bypassing the cache.
    pub async fn read_directory(
        &self,
        root: impl Into<RootRef>,
        path: &str,
    ) -> Result<Option<Vec<(String, HandleRef)>>, ChannelError> {
        let resolved = self.resolve(root, path);
        let (transfer, root_id) = Transfer::root(&resolved.root);
        let request = Request::ReadDirectory(originfs_worker::protocol::ReadDirectory {
            root_id,
            path: resolved.path.clone(),
            create: false,
        });
        let reply = self.channel.request(request, transfer).await.map(Some);
        match swallow(OpKind::ReadDirectory, &resolved.path, reply, None)? {
            Some(Reply::Entries(entries)) => Ok(Some(entries)),
            Some(_) => Err(ChannelError::UnexpectedReply {
                op: OpKind::ReadDirectory,
            }),
            None => Ok(None),
        }
    }
}

fn log_native(e: &FsError, path: &str, op: &str) {
    if e.is_not_found() {
        tracing::debug!(op, path, error = %e, "not found");
    } else {
        tracing::warn!(op, path, error = %e, "operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use originfs_worker::HostContext;

    fn inline_fs() -> OriginFs {
        let config = ChannelConfig {
            host: HostContext {
                workers_supported: true,
                delegated: true,
            },
            ..ChannelConfig::default()
        };
        OriginFs::new(MemoryDirectory::root(), Arc::new(MemoryStore::new()), config)
    }

    #[tokio::test]
    async fn directory_handle_trims_file_like_segment() {
        let fs = inline_fs();
        assert!(fs.write_file(RootRef::Default, "/a/b/c.txt", "x").await.unwrap());

        let dir = fs
            .get_directory_handle(RootRef::Default, "/a/b/c.txt", false)
            .await
            .unwrap();
        assert_eq!(dir.name(), "b");

        let dir = fs.get_directory_handle(RootRef::Default, "/a/b", false).await.unwrap();
        assert_eq!(dir.name(), "b");
    }

    #[tokio::test]
    async fn file_handle_rejects_trailing_separator() {
        let fs = inline_fs();
        fs.write_file(RootRef::Default, "/a/b", "x").await.unwrap();
        assert!(fs.get_file_handle(RootRef::Default, "/a/b/", false).await.is_none());
        assert!(fs.get_file_handle(RootRef::Default, "/a/b", false).await.is_some());
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let fs = inline_fs();
        assert_eq!(fs.read_file(RootRef::Default, "/nope.txt", ReadKind::Text).await.unwrap(), None);
        assert!(!fs.remove(RootRef::Default, "/nope.txt").await.unwrap());
        assert!(!fs.exists(RootRef::Default, "/nope.txt").await);
    }

    #[tokio::test]
    async fn non_recursive_remove_of_full_directory_fails_softly() {
        let fs = inline_fs();
        fs.write_file(RootRef::Default, "/d/f.txt", "x").await.unwrap();
        assert!(!fs.remove_with(RootRef::Default, "/d", false).await.unwrap());
        assert!(fs.remove_directory(RootRef::Default, "/d").await.unwrap());
        assert!(!fs.exists(RootRef::Default, "/d").await);
    }

    #[tokio::test]
    async fn read_kinds() {
        let fs = inline_fs();
        fs.write_file(RootRef::Default, "/b.bin", vec![0xffu8, 0x00]).await.unwrap();

        match fs.read_file(RootRef::Default, "/b.bin", ReadKind::ArrayBuffer).await.unwrap() {
            Some(FileContents::Bytes(bytes)) => assert_eq!(&bytes[..], &[0xff, 0x00]),
            other => panic!("unexpected {:?}", other),
        }
        match fs.read_file(RootRef::Default, "/b.bin", ReadKind::Blob).await.unwrap() {
            Some(FileContents::Blob(blob)) => {
                assert_eq!(blob.name, "b.bin");
                assert_eq!(blob.size(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn writing_handles_copies() {
        let fs = inline_fs();
        let source = MemoryDirectory::root();
        let file = source.get_file("note.md", true).await.unwrap();
        file.write(Bytes::from_static(b"# hi")).await.unwrap();
        source.get_directory("inner", true).await.unwrap();

        assert!(fs.write_file(RootRef::Default, "/copied.md", Arc::clone(&file)).await.unwrap());
        assert_eq!(
            fs.read_text(RootRef::Default, "/copied.md").await.unwrap().as_deref(),
            Some("# hi")
        );

        assert!(fs.write_file(RootRef::Default, "/tree", source).await.unwrap());
        assert!(fs.exists(RootRef::Default, "/tree/note.md").await);
        assert!(fs.exists(RootRef::Default, "/tree/inner").await);
    }

    #[tokio::test]
    async fn mount_survives_persistence_failure() {
        struct ReadOnly;
        impl KeyValueStore for ReadOnly {
            fn get(&self, _key: &str) -> originfs_core::Result<Option<String>> {
                Ok(None)
            }
            fn set(&self, _key: &str, _value: &str) -> originfs_core::Result<()> {
                Err(FsError::Persist {
                    message: "read-only".to_string(),
                })
            }
            fn remove(&self, _key: &str) -> originfs_core::Result<()> {
                Ok(())
            }
        }

        let fs = OriginFs::new(
            MemoryDirectory::root(),
            Arc::new(ReadOnly),
            inline_fs().channel().config().clone(),
        );
        let docs = MemoryDirectory::root();
        assert!(fs.mount("docs", Arc::clone(&docs)).await.is_none());
        assert_eq!(fs.mounts(), vec!["docs"]);
        assert!(fs.unmount("docs").await);
        assert!(fs.mounts().is_empty());
        assert!(!fs.unmount("docs").await);
    }
}
