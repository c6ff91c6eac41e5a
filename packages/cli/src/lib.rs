//! # originfs-cli
//!
//! The `ofs` command: a thin front end over [`originfs::OriginFs`].
//!
//! ```bash
//! ofs write /notes/today.md "# today"
//! ofs ls /notes
//! ofs mount docs ~/Documents
//! ofs --root docs cat /readme.md
//! ofs mounts
//! ```
//!
//! Configuration is read from `--config` or `<config dir>/originfs/config.json`.
//! Unless the config says otherwise, the origin-private root and the mount
//! list live under `<data dir>/originfs`, so state carries over between runs.

pub mod commands;
mod error;

use std::path::{Path, PathBuf};

use originfs::FsConfig;
use tracing_subscriber::EnvFilter;

pub use commands::{execute, Command};
pub use error::{CliError, Result};

const APP_DIR: &str = "originfs";

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
}

/// Load the config at `path` (or the default location) and fill in
/// on-disk locations the file leaves unset.
pub fn load_config(path: Option<&Path>) -> Result<FsConfig> {
    let mut config = match path {
        Some(path) => FsConfig::from_file(path)?,
        None => match default_config_path() {
            Some(path) => FsConfig::from_file_or_default(path)?,
            None => FsConfig::default(),
        },
    };
    if let Some(data) = dirs::data_dir().map(|dir| dir.join(APP_DIR)) {
        if config.origin_root.is_none() {
            config.origin_root = Some(data.join("private"));
        }
        if config.mount_store.is_none() {
            config.mount_store = Some(data.join("mounts.json"));
        }
    }
    Ok(config)
}

/// Install the tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
