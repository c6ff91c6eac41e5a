//! The receiving side of the channel: executes requests against handles.
//!
//! The same host runs inside the worker thread and, when no worker can be
//! started, inline through the direct-handler table. Every mutation it
//! performs is reported to the observations watching the affected
//! directory.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use originfs_core::handle::{walk_directory, walk_file};
use originfs_core::{path, DirHandle, FsError, HandleRef};

use crate::error::RemoteError;
use crate::protocol::{
    Blob, ChangeBatch, ChangeEvent, ChangeKind, CopyEntry, FileContents, Mount, Observe,
    ReadDirectory, ReadFile, ReadKind, Remove, Reply, Request, Transfer, Unmount, Unobserve,
    WriteFile,
};

/// Where change batches produced by the host are delivered.
pub type EventSink = Arc<dyn Fn(ChangeBatch) + Send + Sync>;

type CopyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

/// Executes [`Request`]s.
pub struct WorkerHost {
    /// Observation id -> identity of the watched directory.
    observations: Mutex<HashMap<String, String>>,
    mounts: Mutex<BTreeMap<String, Option<DirHandle>>>,
    sink: EventSink,
}

impl std::fmt::Debug for WorkerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHost")
            .field("observations", &self.observation_count())
            .field("mounts", &self.mounted_ids())
            .finish()
    }
}

impl WorkerHost {
    pub fn new(sink: EventSink) -> Self {
        Self {
            observations: Mutex::new(HashMap::new()),
            mounts: Mutex::new(BTreeMap::new()),
            sink,
        }
    }

    /// Execute one request.
    pub async fn handle(&self, request: Request, transfer: Transfer) -> Result<Reply, RemoteError> {
        let op = request.kind();
        let result = match request {
            Request::ReadDirectory(req) => self.read_directory(req, &transfer).await,
            Request::ReadFile(req) => self.read_file(req, &transfer).await,
            Request::WriteFile(req) => self.write_file(req, &transfer).await,
            Request::Remove(req) => self.remove(req, &transfer).await,
            Request::Copy(req) => self.copy(req, &transfer).await,
            Request::Observe(req) => self.observe(req, &transfer).await,
            Request::Unobserve(req) => Ok(self.unobserve(req)),
            Request::Mount(req) => self.mount(req, &transfer),
            Request::Unmount(req) => Ok(self.unmount(req)),
        };
        if let Err(e) = &result {
            tracing::debug!(%op, error = %e, "request failed");
        }
        result
    }

    pub fn observation_count(&self) -> usize {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn mounted_ids(&self) -> Vec<String> {
        self.mounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    async fn read_directory(
        &self,
        req: ReadDirectory,
        transfer: &Transfer,
    ) -> Result<Reply, RemoteError> {
        let root = transfer.directory(&req.root_id)?;
        let dir = walk_directory(&root, &req.path, req.create).await?;
        Ok(Reply::Entries(dir.entries().await?))
    }

    async fn read_file(&self, req: ReadFile, transfer: &Transfer) -> Result<Reply, RemoteError> {
        let root = transfer.directory(&req.root_id)?;
        let file = walk_file(&root, &req.path, false).await?;
        let data = file.read().await?;
        let contents = match req.kind {
            ReadKind::Text => FileContents::Text(String::from_utf8_lossy(&data).into_owned()),
            ReadKind::ArrayBuffer => FileContents::Bytes(data),
            ReadKind::Blob => FileContents::Blob(Blob {
                name: file.name().to_string(),
                data,
            }),
        };
        Ok(Reply::Contents(contents))
    }

    async fn write_file(&self, req: WriteFile, transfer: &Transfer) -> Result<Reply, RemoteError> {
        let root = transfer.directory(&req.root_id)?;
        let (parent, name) = path::split_parent(&req.path);
        let name = name.ok_or_else(|| RemoteError::new("cannot write to the root directory"))?;
        let dir = walk_directory(&root, &parent, true).await?;
        self.write_into(&dir, &name, req.data).await?;
        Ok(Reply::Done(true))
    }

    async fn write_into(
        &self,
        dir: &DirHandle,
        name: &str,
        data: bytes::Bytes,
    ) -> Result<(), FsError> {
        let existed = matches!(dir.entry(name).await?, Some(HandleRef::File(_)));
        let file = dir.get_file(name, true).await?;
        file.write(data).await?;
        let kind = if existed {
            ChangeKind::Modified
        } else {
            ChangeKind::Created
        };
        self.notify(dir, vec![ChangeEvent::file(name, kind, file)]);
        Ok(())
    }

    async fn remove(&self, req: Remove, transfer: &Transfer) -> Result<Reply, RemoteError> {
        let root = transfer.directory(&req.root_id)?;
        let (parent, name) = path::split_parent(&req.path);
        let name = name.ok_or_else(|| RemoteError::new("cannot remove the root directory"))?;
        let dir = walk_directory(&root, &parent, false).await?;
        dir.remove_entry(&name, req.recursive).await?;
        self.notify(&dir, vec![ChangeEvent::new(name, ChangeKind::Deleted)]);
        Ok(Reply::Done(true))
    }

    async fn copy(&self, req: CopyEntry, transfer: &Transfer) -> Result<Reply, RemoteError> {
        let from = transfer.entry(&req.from)?;
        let to = transfer.entry(&req.to)?;
        match (from, to) {
            (HandleRef::File(src), HandleRef::Directory(dst)) => {
                let data = src.read().await?;
                self.write_into(&dst, src.name(), data).await?;
            }
            (HandleRef::File(src), HandleRef::File(dst)) => {
                dst.write(src.read().await?).await?;
            }
            (HandleRef::Directory(src), HandleRef::Directory(dst)) => {
                if src.identity() == dst.identity() {
                    return Err(RemoteError::new("cannot copy a directory into itself"));
                }
                let skip = dst.identity();
                self.copy_directory(src, dst, &skip).await?;
            }
            (HandleRef::Directory(_), HandleRef::File(_)) => {
                return Err(RemoteError::new("cannot copy a directory onto a file"));
            }
        }
        Ok(Reply::Done(true))
    }

    /// Copy the contents of `src` into `dst`, recursively. A source
    /// directory whose identity is `skip` (the top-level destination) is
    /// never descended into, so copying into any descendant terminates.
    fn copy_directory<'a>(&'a self, src: DirHandle, dst: DirHandle, skip: &'a str) -> CopyFuture<'a> {
        Box::pin(async move {
            for (name, entry) in src.entries().await? {
                match entry {
                    HandleRef::File(file) => {
                        let data = file.read().await?;
                        self.write_into(&dst, &name, data).await?;
                    }
                    HandleRef::Directory(sub) => {
                        if sub.identity() == skip {
                            continue;
                        }
                        let existed = dst.entry(&name).await?.is_some();
                        let target = dst.get_directory(&name, true).await?;
                        if !existed {
                            self.notify(
                                &dst,
                                vec![ChangeEvent::new(name.as_str(), ChangeKind::Created)
                                    .with_handle(HandleRef::Directory(Arc::clone(&target)))],
                            );
                        }
                        self.copy_directory(sub, target, skip).await?;
                    }
                }
            }
            Ok(())
        })
    }

    async fn observe(&self, req: Observe, transfer: &Transfer) -> Result<Reply, RemoteError> {
        let root = transfer.directory(&req.root_id)?;
        let dir = walk_directory(&root, &req.path, false).await?;
        let identity = dir.identity();
        tracing::debug!(id = %req.id, dir = %identity, "observing");
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(req.id, identity);
        Ok(Reply::Done(true))
    }

    fn unobserve(&self, req: Unobserve) -> Reply {
        let removed = self
            .observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&req.id)
            .is_some();
        Reply::Done(removed)
    }

    fn mount(&self, req: Mount, transfer: &Transfer) -> Result<Reply, RemoteError> {
        let handle = match &req.handle {
            Some(key) => Some(transfer.directory(key)?),
            None => None,
        };
        self.mounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(req.id, handle);
        Ok(Reply::Done(true))
    }

    fn unmount(&self, req: Unmount) -> Reply {
        let removed = self
            .mounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&req.id)
            .is_some();
        Reply::Done(removed)
    }

    /// Deliver `changes` to every observation watching `dir`.
    fn notify(&self, dir: &DirHandle, changes: Vec<ChangeEvent>) {
        let identity = dir.identity();
        let watchers: Vec<String> = self
            .observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, watched)| **watched == identity)
            .map(|(id, _)| id.clone())
            .collect();

        for observation in watchers {
            (self.sink)(ChangeBatch {
                observation,
                changes: changes.clone(),
            });
        }
    }
}
