//! originfs core: roots, paths and storage handles.
//!
//! This layer knows nothing about workers or caching. It provides:
//! - `path`: pure path normalization (`.`/`..`, absolute replacement)
//! - `PrefixTable`: longest-prefix lookup of root bindings
//! - `DirectoryHandle` / `FileHandle`: the storage capability traits, with
//!   in-memory and local-disk backends
//! - `RootRegistry`: static prefix bindings plus the persisted mount table
//! - `PathResolver`: root reference + path -> concrete root handle
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use originfs_core::{MemoryDirectory, MemoryStore, PathResolver, RootRef, RootRegistry};
//!
//! let registry = RootRegistry::with_defaults(MemoryDirectory::root(), Arc::new(MemoryStore::new()));
//! let resolver = PathResolver::new(Arc::new(registry));
//!
//! let resolved = resolver.resolve(&RootRef::Default, "/user/notes/../todo.txt");
//! assert_eq!(resolved.path, "/todo.txt");
//! ```

mod error;
pub mod handle;
pub mod kv;
pub mod local;
pub mod memory;
pub mod path;
mod prefix_table;
pub mod registry;
mod resolver;

pub use bytes::Bytes;

pub use error::{FsError, Result};
pub use handle::{DirHandle, DirectoryHandle, EntryKind, FileHandle, FileRef, HandleRef};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use local::LocalDirectory;
pub use memory::MemoryDirectory;
pub use prefix_table::{PrefixMatch, PrefixTable};
pub use registry::{MountEntry, RootRegistry, RootResolver, RootSpec, MOUNTED_KEY, USER_MOUNT_ID};
pub use resolver::{PathResolver, Resolved, RootRef};
