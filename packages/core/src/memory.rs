//! In-memory origin-private storage.
//!
//! The tree lives entirely in process memory and is shared between every
//! handle cloned out of it, including handles moved to the worker thread.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{FsError, Result};
use crate::handle::{validate_name, DirHandle, DirectoryHandle, FileHandle, FileRef, HandleRef};

#[derive(Debug)]
struct DirNode {
    id: Uuid,
    entries: BTreeMap<String, Node>,
}

impl DirNode {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Arc<Mutex<Bytes>>),
    Dir(Arc<Mutex<DirNode>>),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A directory in the in-memory tree.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    name: String,
    id: Uuid,
    node: Arc<Mutex<DirNode>>,
}

impl MemoryDirectory {
    /// Create a fresh, empty root.
    pub fn root() -> DirHandle {
        Arc::new(Self::from_node(String::new(), Arc::new(Mutex::new(DirNode::new()))))
    }

    fn from_node(name: String, node: Arc<Mutex<DirNode>>) -> Self {
        let id = lock(&node).id;
        Self { name, id, node }
    }

    fn wrap(name: &str, node: &Node) -> HandleRef {
        match node {
            Node::File(data) => HandleRef::File(Arc::new(MemoryFile {
                name: name.to_string(),
                data: Arc::clone(data),
            })),
            Node::Dir(dir) => HandleRef::Directory(Arc::new(Self::from_node(
                name.to_string(),
                Arc::clone(dir),
            ))),
        }
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        format!("memory:{}", self.id)
    }

    async fn get_directory(&self, name: &str, create: bool) -> Result<DirHandle> {
        validate_name(name)?;
        let mut node = lock(&self.node);
        let child = match node.entries.get(name) {
            Some(Node::Dir(dir)) => Arc::clone(dir),
            Some(Node::File(_)) => {
                return Err(FsError::TypeMismatch {
                    path: name.to_string(),
                    expected: "directory",
                })
            }
            None if create => {
                let dir = Arc::new(Mutex::new(DirNode::new()));
                node.entries.insert(name.to_string(), Node::Dir(Arc::clone(&dir)));
                dir
            }
            None => {
                return Err(FsError::NotFound {
                    path: name.to_string(),
                })
            }
        };
        drop(node);
        Ok(Arc::new(Self::from_node(name.to_string(), child)))
    }

    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef> {
        validate_name(name)?;
        let mut node = lock(&self.node);
        let data = match node.entries.get(name) {
            Some(Node::File(data)) => Arc::clone(data),
            Some(Node::Dir(_)) => {
                return Err(FsError::TypeMismatch {
                    path: name.to_string(),
                    expected: "file",
                })
            }
            None if create => {
                let data = Arc::new(Mutex::new(Bytes::new()));
                node.entries
                    .insert(name.to_string(), Node::File(Arc::clone(&data)));
                data
            }
            None => {
                return Err(FsError::NotFound {
                    path: name.to_string(),
                })
            }
        };
        Ok(Arc::new(MemoryFile {
            name: name.to_string(),
            data,
        }))
    }

    async fn entries(&self) -> Result<Vec<(String, HandleRef)>> {
        let node = lock(&self.node);
        Ok(node
            .entries
            .iter()
            .map(|(name, child)| (name.clone(), Self::wrap(name, child)))
            .collect())
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<()> {
        validate_name(name)?;
        let mut node = lock(&self.node);
        match node.entries.get(name) {
            None => Err(FsError::NotFound {
                path: name.to_string(),
            }),
            Some(Node::Dir(dir)) if !recursive && !lock(dir).entries.is_empty() => {
                Err(FsError::NotEmpty {
                    path: name.to_string(),
                })
            }
            Some(_) => {
                node.entries.remove(name);
                Ok(())
            }
        }
    }
}

/// A file in the in-memory tree.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Arc<Mutex<Bytes>>,
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<Bytes> {
        Ok(lock(&self.data).clone())
    }

    async fn write(&self, data: Bytes) -> Result<()> {
        *lock(&self.data) = data;
        Ok(())
    }

    async fn size(&self) -> Result<u64> {
        Ok(lock(&self.data).len() as u64)
    }
}
