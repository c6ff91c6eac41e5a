//! Local-disk directories.
//!
//! Used for user-mounted external directories and, when configured, as a
//! persistent origin-private root.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::error::{FsError, Result};
use crate::handle::{validate_name, DirHandle, DirectoryHandle, FileHandle, FileRef, HandleRef};

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    name: String,
    path: PathBuf,
}

impl LocalDirectory {
    /// Open an existing directory as a root handle.
    pub fn open(path: impl Into<PathBuf>) -> Result<DirHandle> {
        let path = path.into();
        let display = path.display().to_string();
        let attr = std::fs::metadata(&path).map_err(|e| FsError::from_io(e, &display))?;
        if !attr.is_dir() {
            return Err(FsError::TypeMismatch {
                path: display,
                expected: "directory",
            });
        }
        let path = path
            .canonicalize()
            .map_err(|e| FsError::from_io(e, &display))?;
        Ok(Arc::new(Self {
            name: String::new(),
            path,
        }))
    }

    /// The absolute path backing this handle.
    pub fn path(&self) -> &FsPath {
        &self.path
    }

    fn child(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

fn display(path: &FsPath) -> String {
    path.display().to_string()
}

#[async_trait]
impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        format!("local:{}", self.path.display())
    }

    async fn get_directory(&self, name: &str, create: bool) -> Result<DirHandle> {
        validate_name(name)?;
        let path = self.child(name);
        match fs::metadata(&path).await {
            Ok(attr) if attr.is_dir() => {}
            Ok(_) => {
                return Err(FsError::TypeMismatch {
                    path: display(&path),
                    expected: "directory",
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && create => {
                tracing::debug!(path = %path.display(), "creating directory");
                fs::create_dir(&path)
                    .await
                    .map_err(|e| FsError::from_io(e, display(&path)))?;
            }
            Err(e) => return Err(FsError::from_io(e, display(&path))),
        }
        Ok(Arc::new(Self {
            name: name.to_string(),
            path,
        }))
    }

    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef> {
        validate_name(name)?;
        let path = self.child(name);
        match fs::metadata(&path).await {
            Ok(attr) if attr.is_file() => {}
            Ok(_) => {
                return Err(FsError::TypeMismatch {
                    path: display(&path),
                    expected: "file",
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && create => {
                fs::write(&path, b"")
                    .await
                    .map_err(|e| FsError::from_io(e, display(&path)))?;
            }
            Err(e) => return Err(FsError::from_io(e, display(&path))),
        }
        Ok(Arc::new(LocalFile {
            name: name.to_string(),
            path,
        }))
    }

    async fn entries(&self) -> Result<Vec<(String, HandleRef)>> {
        let mut dir = fs::read_dir(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, display(&self.path)))?;
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %entry.path().display(), "skipping non-utf8 entry");
                continue;
            };
            let file_type = entry.file_type().await?;
            let handle = if file_type.is_dir() {
                HandleRef::Directory(Arc::new(LocalDirectory {
                    name: name.clone(),
                    path: entry.path(),
                }))
            } else {
                HandleRef::File(Arc::new(LocalFile {
                    name: name.clone(),
                    path: entry.path(),
                }))
            };
            out.push((name, handle));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<()> {
        validate_name(name)?;
        let path = self.child(name);
        let attr = fs::metadata(&path)
            .await
            .map_err(|e| FsError::from_io(e, display(&path)))?;
        let result = if !attr.is_dir() {
            fs::remove_file(&path).await
        } else if recursive {
            fs::remove_dir_all(&path).await
        } else {
            let mut children = fs::read_dir(&path)
                .await
                .map_err(|e| FsError::from_io(e, display(&path)))?;
            if children.next_entry().await?.is_some() {
                return Err(FsError::NotEmpty {
                    path: display(&path),
                });
            }
            fs::remove_dir(&path).await
        };
        result.map_err(|e| FsError::from_io(e, display(&path)))
    }
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<Bytes> {
        tracing::debug!(path = %self.path.display(), "reading");
        let data = fs::read(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, display(&self.path)))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, data: Bytes) -> Result<()> {
        tracing::debug!(path = %self.path.display(), len = data.len(), "writing");
        fs::write(&self.path, &data)
            .await
            .map_err(|e| FsError::from_io(e, display(&self.path)))
    }

    async fn size(&self) -> Result<u64> {
        let attr = fs::metadata(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, display(&self.path)))?;
        Ok(attr.len())
    }
}
