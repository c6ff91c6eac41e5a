use originfs::{ChannelError, FsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Fs(#[from] FsError),

    #[error("{0}")]
    Channel(#[from] ChannelError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not write {0}")]
    NotWritten(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
