//! Filesystem configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use originfs_core::{FsError, Result};
use originfs_worker::ChannelConfig;
use serde::{Deserialize, Serialize};

/// Configuration for [`OriginFs::from_config`](crate::OriginFs::from_config).
///
/// ```json
/// {
///   "originRoot": "/var/lib/originfs/private",
///   "mountStore": "/var/lib/originfs/mounts.json",
///   "channel": { "timeout": 30000, "retries": 3 },
///   "mounts": { "docs": "/home/me/Documents" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FsConfig {
    /// Directory backing the origin-private root. In memory when unset.
    pub origin_root: Option<PathBuf>,
    /// File holding the persisted mount list. In memory when unset.
    pub mount_store: Option<PathBuf>,
    pub channel: ChannelConfig,
    /// Directories granted at start-up, by mount id.
    pub mounts: BTreeMap<String, PathBuf>,
}

impl FsConfig {
    /// Read a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FsError::from_io(e, path.display().to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Like [`FsConfig::from_file`], but a missing file yields the default.
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::from_file(path) {
            Err(e) if e.is_not_found() => Ok(Self::default()),
            other => other,
        }
    }
}
