//! Request/response protocol between the caller and the worker.
//!
//! Every op has its own payload struct. Payloads name roots and entries by
//! string keys; the handles themselves travel next to the payload in a
//! [`Transfer`] so the receiving side operates on exactly the capability
//! the caller resolved, without re-resolving anything by name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use originfs_core::{DirHandle, FileRef, HandleRef};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::RemoteError;

/// Operation names, as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpKind {
    ReadDirectory,
    ReadFile,
    WriteFile,
    Remove,
    Copy,
    Observe,
    Unobserve,
    Mount,
    Unmount,
}

impl OpKind {
    pub const ALL: [OpKind; 9] = [
        OpKind::ReadDirectory,
        OpKind::ReadFile,
        OpKind::WriteFile,
        OpKind::Remove,
        OpKind::Copy,
        OpKind::Observe,
        OpKind::Unobserve,
        OpKind::Mount,
        OpKind::Unmount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::ReadDirectory => "readDirectory",
            OpKind::ReadFile => "readFile",
            OpKind::WriteFile => "writeFile",
            OpKind::Remove => "remove",
            OpKind::Copy => "copy",
            OpKind::Observe => "observe",
            OpKind::Unobserve => "unobserve",
            OpKind::Mount => "mount",
            OpKind::Unmount => "unmount",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadDirectory {
    pub root_id: String,
    pub path: String,
    pub create: bool,
}

/// How file contents should be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadKind {
    #[default]
    Text,
    ArrayBuffer,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFile {
    pub root_id: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ReadKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFile {
    pub root_id: String,
    pub path: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remove {
    pub root_id: String,
    pub path: String,
    pub recursive: bool,
}

/// Copy `from` into `to`. Both are keys into the request's [`Transfer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyEntry {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observe {
    pub root_id: String,
    pub path: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unobserve {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub id: String,
    /// Transfer key of the mounted root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unmount {
    pub id: String,
}

/// One request to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "camelCase")]
pub enum Request {
    ReadDirectory(ReadDirectory),
    ReadFile(ReadFile),
    WriteFile(WriteFile),
    Remove(Remove),
    Copy(CopyEntry),
    Observe(Observe),
    Unobserve(Unobserve),
    Mount(Mount),
    Unmount(Unmount),
}

impl Request {
    pub fn kind(&self) -> OpKind {
        match self {
            Request::ReadDirectory(_) => OpKind::ReadDirectory,
            Request::ReadFile(_) => OpKind::ReadFile,
            Request::WriteFile(_) => OpKind::WriteFile,
            Request::Remove(_) => OpKind::Remove,
            Request::Copy(_) => OpKind::Copy,
            Request::Observe(_) => OpKind::Observe,
            Request::Unobserve(_) => OpKind::Unobserve,
            Request::Mount(_) => OpKind::Mount,
            Request::Unmount(_) => OpKind::Unmount,
        }
    }
}

/// Handles moved alongside a request, keyed by the names the payload uses.
#[derive(Debug, Clone, Default)]
pub struct Transfer {
    handles: BTreeMap<String, HandleRef>,
}

impl Transfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transfer carrying one root, keyed by its identity.
    ///
    /// Returns the transfer and the key to put in the payload's `root_id`.
    pub fn root(root: &DirHandle) -> (Self, String) {
        let key = root.identity();
        let mut transfer = Self::new();
        transfer.insert(key.clone(), HandleRef::Directory(Arc::clone(root)));
        (transfer, key)
    }

    pub fn insert(&mut self, key: impl Into<String>, handle: HandleRef) {
        self.handles.insert(key.into(), handle);
    }

    pub fn get(&self, key: &str) -> Option<&HandleRef> {
        self.handles.get(key)
    }

    /// The directory handle under `key`.
    pub fn directory(&self, key: &str) -> Result<DirHandle, RemoteError> {
        match self.handles.get(key) {
            Some(HandleRef::Directory(dir)) => Ok(Arc::clone(dir)),
            Some(HandleRef::File(_)) => Err(RemoteError::new(format!(
                "transferred handle {} is not a directory",
                key
            ))),
            None => Err(RemoteError::new(format!("no transferred handle {}", key))),
        }
    }

    /// The handle of either kind under `key`.
    pub fn entry(&self, key: &str) -> Result<HandleRef, RemoteError> {
        self.handles
            .get(key)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("no transferred handle {}", key)))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// File contents in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    Text(String),
    Bytes(Bytes),
    Blob(Blob),
}

impl FileContents {
    /// The raw bytes, whatever the shape.
    pub fn into_bytes(self) -> Bytes {
        match self {
            FileContents::Text(text) => Bytes::from(text),
            FileContents::Bytes(bytes) => bytes,
            FileContents::Blob(blob) => blob.data,
        }
    }
}

/// A named chunk of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub data: Bytes,
}

impl Blob {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Reply to a request.
#[derive(Debug, Clone)]
pub enum Reply {
    Entries(Vec<(String, HandleRef)>),
    Contents(FileContents),
    Done(bool),
}

/// A request in flight, with the slot its reply goes to.
#[derive(Debug)]
pub struct Envelope {
    pub id: u64,
    pub request: Request,
    pub transfer: Transfer,
    pub reply: oneshot::Sender<Result<Reply, RemoteError>>,
}

/// Kinds of filesystem change reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Modified,
    Created,
    Appeared,
    Deleted,
    Disappeared,
}

impl ChangeKind {
    /// True for kinds that add or update an entry.
    pub fn is_upsert(self) -> bool {
        matches!(
            self,
            ChangeKind::Modified | ChangeKind::Created | ChangeKind::Appeared
        )
    }
}

/// One change to a watched directory.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub name: String,
    pub kind: ChangeKind,
    /// The changed entry, when the producer has it at hand.
    pub handle: Option<HandleRef>,
}

impl ChangeEvent {
    pub fn new(name: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: HandleRef) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn file(name: impl Into<String>, kind: ChangeKind, file: FileRef) -> Self {
        Self::new(name, kind).with_handle(HandleRef::File(file))
    }
}

/// Changes for one observation, delivered together.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub observation: String,
    pub changes: Vec<ChangeEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use originfs_core::MemoryDirectory;
    use serde_json::json;

    #[test]
    fn requests_serialize_with_op_tag() {
        let request = Request::ReadDirectory(ReadDirectory {
            root_id: "memory:1".to_string(),
            path: "/a".to_string(),
            create: false,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "readDirectory",
                "payload": {"rootId": "memory:1", "path": "/a", "create": false}
            })
        );
    }

    #[test]
    fn read_kind_uses_type_field() {
        let request = Request::ReadFile(ReadFile {
            root_id: "r".to_string(),
            path: "/a.bin".to_string(),
            kind: ReadKind::ArrayBuffer,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["payload"]["type"], json!("arrayBuffer"));

        let back: Request = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), OpKind::ReadFile);
    }

    #[test]
    fn op_names_match_serde_names() {
        for op in OpKind::ALL {
            assert_eq!(serde_json::to_value(op).unwrap(), json!(op.as_str()));
        }
    }

    #[test]
    fn change_kinds() {
        assert!(ChangeKind::Created.is_upsert());
        assert!(ChangeKind::Appeared.is_upsert());
        assert!(ChangeKind::Modified.is_upsert());
        assert!(!ChangeKind::Deleted.is_upsert());
        assert!(!ChangeKind::Disappeared.is_upsert());
        assert_eq!(
            serde_json::from_str::<ChangeKind>("\"disappeared\"").unwrap(),
            ChangeKind::Disappeared
        );
    }

    #[test]
    fn transfer_lookup() {
        let root = MemoryDirectory::root();
        let (transfer, key) = Transfer::root(&root);
        assert_eq!(key, root.identity());
        assert_eq!(transfer.directory(&key).unwrap().identity(), key);
        assert!(transfer.directory("other").is_err());
        assert_eq!(transfer.len(), 1);
    }
}
