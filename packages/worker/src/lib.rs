//! originfs worker: the off-thread I/O channel.
//!
//! Storage operations are described as [`Request`]s and executed by a
//! [`WorkerHost`], normally on a dedicated worker thread reached through a
//! [`WorkerChannel`]. When no worker can be started the channel runs the
//! same host inline through [`DirectHandlers`].
//!
//! Change notifications flow the other way: the host reports every mutation
//! to the observations watching the affected directory, and the caller-side
//! [`ObserverRegistry`] routes them to their handlers.

mod channel;
mod direct;
mod error;
mod host;
mod observers;
pub mod protocol;
mod spawn;

pub use channel::{ChannelConfig, ChannelState, HostContext, WorkerChannel};
pub use direct::{DirectFuture, DirectHandler, DirectHandlers};
pub use error::{ChannelError, RemoteError, Result, SpawnError};
pub use host::{EventSink, WorkerHost};
pub use observers::{ChangeHandler, ObserverRegistry};
pub use protocol::{
    Blob, ChangeBatch, ChangeEvent, ChangeKind, Envelope, FileContents, OpKind, ReadKind, Reply,
    Request, Transfer,
};
pub use spawn::{ThreadSpawner, Transport, WorkerSpawner};
