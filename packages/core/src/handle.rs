//! Storage handles.
//!
//! A handle is a capability to one directory or file inside a root. Every
//! backend (the in-memory origin-private tree, local-disk mounts) exposes
//! the same two traits, so the rest of the system never knows which one it
//! is talking to.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};
use crate::path;

/// Shared reference to a directory handle.
pub type DirHandle = Arc<dyn DirectoryHandle>;

/// Shared reference to a file handle.
pub type FileRef = Arc<dyn FileHandle>;

/// Kind of entry a handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// A directory inside some root.
#[async_trait]
pub trait DirectoryHandle: Send + Sync + fmt::Debug {
    /// The entry name of this directory (empty for a root).
    fn name(&self) -> &str;

    /// A string that is equal for two handles iff they address the same
    /// underlying directory.
    fn identity(&self) -> String;

    /// Open (or create) a child directory.
    async fn get_directory(&self, name: &str, create: bool) -> Result<DirHandle>;

    /// Open (or create) a child file.
    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef>;

    /// Enumerate direct children.
    async fn entries(&self) -> Result<Vec<(String, HandleRef)>>;

    /// Remove a child. Non-empty directories require `recursive`.
    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<()>;

    /// Look up one child of either kind.
    async fn entry(&self, name: &str) -> Result<Option<HandleRef>> {
        match self.get_file(name, false).await {
            Ok(file) => Ok(Some(HandleRef::File(file))),
            Err(FsError::TypeMismatch { .. }) => {
                Ok(Some(HandleRef::Directory(self.get_directory(name, false).await?)))
            }
            Err(FsError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A file inside some root.
#[async_trait]
pub trait FileHandle: Send + Sync + fmt::Debug {
    /// The entry name of this file.
    fn name(&self) -> &str;

    /// Read the whole file.
    async fn read(&self) -> Result<Bytes>;

    /// Replace the file contents.
    async fn write(&self, data: Bytes) -> Result<()>;

    /// Size in bytes.
    async fn size(&self) -> Result<u64> {
        Ok(self.read().await?.len() as u64)
    }
}

/// A handle of either kind, as stored in directory listings.
#[derive(Clone, Debug)]
pub enum HandleRef {
    File(FileRef),
    Directory(DirHandle),
}

impl HandleRef {
    pub fn name(&self) -> &str {
        match self {
            HandleRef::File(f) => f.name(),
            HandleRef::Directory(d) => d.name(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            HandleRef::File(_) => EntryKind::File,
            HandleRef::Directory(_) => EntryKind::Directory,
        }
    }

    pub fn as_directory(&self) -> Option<&DirHandle> {
        match self {
            HandleRef::Directory(d) => Some(d),
            HandleRef::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            HandleRef::File(f) => Some(f),
            HandleRef::Directory(_) => None,
        }
    }
}

impl From<DirHandle> for HandleRef {
    fn from(dir: DirHandle) -> Self {
        HandleRef::Directory(dir)
    }
}

impl From<FileRef> for HandleRef {
    fn from(file: FileRef) -> Self {
        HandleRef::File(file)
    }
}

/// Reject names that cannot be a single directory entry.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(path::SEPARATOR) {
        return Err(FsError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Walk a normalized path from `root`, one directory at a time.
pub async fn walk_directory(root: &DirHandle, path: &str, create: bool) -> Result<DirHandle> {
    let mut current = Arc::clone(root);
    for segment in path::segments(path) {
        current = current.get_directory(segment, create).await?;
    }
    Ok(current)
}

/// Walk to the file at a normalized path, creating parents when `create`.
pub async fn walk_file(root: &DirHandle, path: &str, create: bool) -> Result<FileRef> {
    let (parent, name) = path::split_parent(path);
    let name = name.ok_or_else(|| FsError::InvalidName {
        name: path.to_string(),
    })?;
    let dir = walk_directory(root, &parent, create).await?;
    dir.get_file(&name, create).await
}

/// Walk to an entry of either kind. The root path yields the root itself.
pub async fn walk_entry(root: &DirHandle, path: &str) -> Result<Option<HandleRef>> {
    let (parent, name) = path::split_parent(path);
    let Some(name) = name else {
        return Ok(Some(HandleRef::Directory(Arc::clone(root))));
    };
    match walk_directory(root, &parent, false).await {
        Ok(dir) => dir.entry(&name).await,
        Err(FsError::NotFound { .. }) | Err(FsError::TypeMismatch { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;

    #[test]
    fn names_with_separators_are_rejected() {
        assert!(validate_name("a").is_ok());
        assert!(validate_name("a.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
    }

    #[tokio::test]
    async fn walk_creates_intermediate_directories() {
        let root: DirHandle = MemoryDirectory::root();
        let dir = walk_directory(&root, "/a/b/c", true).await.unwrap();
        assert_eq!(dir.name(), "c");

        let again = walk_directory(&root, "/a/b/c", false).await.unwrap();
        assert_eq!(dir.identity(), again.identity());
    }

    #[tokio::test]
    async fn walk_without_create_reports_not_found() {
        let root: DirHandle = MemoryDirectory::root();
        let err = walk_directory(&root, "/missing", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn walk_file_and_entry() {
        let root: DirHandle = MemoryDirectory::root();
        let file = walk_file(&root, "/docs/readme.md", true).await.unwrap();
        file.write(Bytes::from_static(b"hi")).await.unwrap();

        let entry = walk_entry(&root, "/docs/readme.md").await.unwrap().unwrap();
        assert_eq!(entry.kind(), EntryKind::File);

        let dir = walk_entry(&root, "/docs").await.unwrap().unwrap();
        assert_eq!(dir.kind(), EntryKind::Directory);

        assert!(walk_entry(&root, "/nope/x").await.unwrap().is_none());
        assert!(walk_entry(&root, "/").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn walk_file_rejects_root() {
        let root: DirHandle = MemoryDirectory::root();
        let err = walk_file(&root, "/", true).await.unwrap_err();
        assert!(matches!(err, FsError::InvalidName { .. }));
    }
}
