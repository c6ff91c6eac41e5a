//! Starting the worker.
//!
//! The worker is a dedicated OS thread with its own single-threaded tokio
//! runtime. The caller talks to it through an unbounded channel of
//! envelope batches; replies come back through each envelope's oneshot.

use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;

use crate::error::SpawnError;
use crate::host::{EventSink, WorkerHost};
use crate::protocol::Envelope;

/// Sending half of a running worker.
pub type Transport = mpsc::UnboundedSender<Vec<Envelope>>;

/// Something that can start a worker.
pub trait WorkerSpawner: Send + Sync {
    /// Start a worker whose change events go to `events`.
    fn spawn(&self, events: EventSink) -> Result<Transport, SpawnError>;
}

/// Runs a [`WorkerHost`] on a named thread.
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
    name: String,
}

impl ThreadSpawner {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new("originfs-worker")
    }
}

impl WorkerSpawner for ThreadSpawner {
    fn spawn(&self, events: EventSink) -> Result<Transport, SpawnError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(SpawnError::Runtime)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Envelope>>();
        let host = Arc::new(WorkerHost::new(events));

        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(batch) = rx.recv().await {
                        for envelope in batch {
                            let host = Arc::clone(&host);
                            tokio::spawn(async move {
                                let Envelope {
                                    id,
                                    request,
                                    transfer,
                                    reply,
                                } = envelope;
                                let result = host.handle(request, transfer).await;
                                if reply.send(result).is_err() {
                                    tracing::trace!(id, "caller went away before the reply");
                                }
                            });
                        }
                    }
                    tracing::debug!("worker channel closed, stopping");
                });
            })
            .map_err(SpawnError::Thread)?;

        tracing::debug!(name = %self.name, "worker started");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ReadDirectory, Reply, Request, Transfer, WriteFile};
    use bytes::Bytes;
    use originfs_core::MemoryDirectory;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn thread_worker_executes_batches() {
        let spawner = ThreadSpawner::default();
        let transport = spawner.spawn(Arc::new(|_| {})).unwrap();
        let root = MemoryDirectory::root();
        let (transfer, key) = Transfer::root(&root);

        let (write_tx, write_rx) = oneshot::channel();
        let (read_tx, read_rx) = oneshot::channel();
        transport
            .send(vec![Envelope {
                id: 1,
                request: Request::WriteFile(WriteFile {
                    root_id: key.clone(),
                    path: "/a.txt".to_string(),
                    data: Bytes::from_static(b"a"),
                }),
                transfer: transfer.clone(),
                reply: write_tx,
            }])
            .unwrap();
        assert!(matches!(write_rx.await.unwrap(), Ok(Reply::Done(true))));

        transport
            .send(vec![Envelope {
                id: 2,
                request: Request::ReadDirectory(ReadDirectory {
                    root_id: key,
                    path: "/".to_string(),
                    create: false,
                }),
                transfer,
                reply: read_tx,
            }])
            .unwrap();
        match read_rx.await.unwrap() {
            Ok(Reply::Entries(entries)) => {
                let names: Vec<_> = entries.into_iter().map(|(n, _)| n).collect();
                assert_eq!(names, vec!["a.txt"]);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
