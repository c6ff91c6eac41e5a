//! originfs: one path-addressed filesystem over the origin-private root
//! and user-mounted directories.
//!
//! [`OriginFs`] is the entry point. Paths are resolved to a root by
//! longest matching prefix or by mount id, storage I/O runs on a worker
//! thread through a retrying channel, and [`DirectoryView`]s give live,
//! shared, reference-counted listings that follow changes made through the
//! facade.
//!
//! # Example
//!
//! ```rust,no_run
//! use originfs::{OpenOptions, OriginFs, RootRef};
//!
//! # async fn demo() -> Result<(), originfs::ChannelError> {
//! let fs = OriginFs::in_memory();
//! fs.write_file(RootRef::Default, "/notes/today.md", "# today").await?;
//!
//! let notes = fs.open_directory(RootRef::Default, "/notes", OpenOptions::default());
//! notes.ready().await;
//! assert!(notes.has("today.md"));
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod facade;
mod listing;

pub use cache::{CacheKey, DirectoryCache, DirectoryState, DirectoryView, OpenOptions};
pub use config::FsConfig;
pub use facade::{OriginFs, WriteData};
pub use listing::Listing;

pub use originfs_core::{
    Bytes, DirHandle, DirectoryHandle, EntryKind, FileHandle, FileRef, FsError, HandleRef,
    LocalDirectory, MemoryDirectory, RootRef, USER_MOUNT_ID,
};
pub use originfs_worker::{
    Blob, ChangeKind, ChannelConfig, ChannelError, ChannelState, FileContents, HostContext,
    ReadKind,
};
