//! The request channel to the worker.
//!
//! A [`WorkerChannel`] lazily starts its worker on first use. Start-up is
//! memoized, so concurrent first callers share one attempt. If the worker
//! cannot be started the channel becomes [`ChannelState::Unavailable`] for
//! good and every request runs through the direct-handler table instead.
//!
//! Requests sent to a live worker carry a deadline. A timed-out or
//! undeliverable attempt is retried with a fresh id and deadline until the
//! retry budget runs out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, OnceCell};
use tokio::time::Instant;

use crate::direct::DirectHandlers;
use crate::error::{ChannelError, Result};
use crate::host::{EventSink, WorkerHost};
use crate::observers::ObserverRegistry;
use crate::protocol::{Envelope, OpKind, Reply, Request, Transfer};
use crate::spawn::{ThreadSpawner, Transport, WorkerSpawner};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_QUEUE_NAME: &str = "originfs-worker";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the current execution context allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostContext {
    /// Workers can be created at all.
    pub workers_supported: bool,
    /// We are ourselves running in a delegated context that may not spawn
    /// nested workers.
    pub delegated: bool,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            workers_supported: true,
            delegated: false,
        }
    }
}

impl HostContext {
    pub fn can_spawn(&self) -> bool {
        self.workers_supported && !self.delegated
    }
}

/// Channel tuning. Durations are written in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Deadline for one attempt.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Extra attempts after the first.
    pub retries: u32,
    /// Coalesce requests issued in the same scheduling turn into one message.
    pub batching: bool,
    /// Name of the worker thread.
    pub queue_name: String,
    pub host: HostContext,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            batching: true,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            host: HostContext::default(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Lifecycle of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    /// The spawner is running. Spawning is synchronous, so only callers on
    /// other threads can see this state.
    Initializing,
    Ready,
    /// Terminal. Requests use the direct handlers.
    Unavailable,
}

/// Bookkeeping for one attempt in flight.
#[derive(Debug, Clone)]
struct PendingRequest {
    op: OpKind,
    retries_remaining: u32,
    deadline: Instant,
}

/// Queued, retrying, batching request channel.
pub struct WorkerChannel {
    config: ChannelConfig,
    spawner: Arc<dyn WorkerSpawner>,
    direct: DirectHandlers,
    observers: Arc<ObserverRegistry>,
    state: Mutex<ChannelState>,
    transport: OnceCell<Option<Transport>>,
    outbox: Arc<Mutex<Vec<Envelope>>>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for WorkerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerChannel")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("direct", &self.direct)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl WorkerChannel {
    pub fn new(
        config: ChannelConfig,
        spawner: Arc<dyn WorkerSpawner>,
        direct: DirectHandlers,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            config,
            spawner,
            direct,
            observers,
            state: Mutex::new(ChannelState::Uninitialized),
            transport: OnceCell::new(),
            outbox: Arc::new(Mutex::new(Vec::new())),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// A channel backed by a worker thread, with an inline host covering
    /// every op as the fallback.
    pub fn standard(config: ChannelConfig, observers: Arc<ObserverRegistry>) -> Self {
        let direct = DirectHandlers::with_host(Arc::new(WorkerHost::new(dispatch_to(
            &observers,
        ))));
        let spawner = ThreadSpawner::new(config.queue_name.clone());
        Self::new(config, Arc::new(spawner), direct, observers)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    pub fn state(&self) -> ChannelState {
        *lock(&self.state)
    }

    /// Attempts currently waiting for a reply.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Start the worker if that has not been tried yet.
    pub async fn ensure_ready(&self) -> ChannelState {
        self.transport().await;
        self.state()
    }

    /// Send `request` and wait for its reply.
    pub async fn request(&self, request: Request, transfer: Transfer) -> Result<Reply> {
        let op = request.kind();
        let Some(transport) = self.transport().await else {
            return self.request_direct(op, request, transfer).await;
        };

        let attempts = self.config.retries.saturating_add(1);
        let mut last = None;
        for attempt in 1..=attempts {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let pending = PendingRequest {
                op,
                retries_remaining: attempts - attempt,
                deadline: Instant::now() + self.config.timeout,
            };
            match self
                .attempt(&transport, id, pending, request.clone(), transfer.clone())
                .await
            {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(%op, id, attempt, error = %e, "request attempt failed");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let last = last.map(|e| e.to_string()).unwrap_or_default();
        tracing::warn!(%op, attempts, %last, "request failed, retries exhausted");
        Err(ChannelError::RetriesExhausted { op, attempts, last })
    }

    async fn attempt(
        &self,
        transport: &Transport,
        id: u64,
        pending: PendingRequest,
        request: Request,
        transfer: Transfer,
    ) -> Result<Reply> {
        let op = pending.op;
        let deadline = pending.deadline;
        tracing::trace!(%op, id, retries_remaining = pending.retries_remaining, "sending");
        lock(&self.pending).insert(id, pending);

        let (reply, rx) = oneshot::channel();
        let sent = self.send(
            transport,
            Envelope {
                id,
                request,
                transfer,
                reply,
            },
        );
        let result = match sent {
            Ok(()) => match tokio::time::timeout_at(deadline, rx).await {
                Ok(Ok(Ok(reply))) => Ok(reply),
                Ok(Ok(Err(error))) => Err(ChannelError::Remote { op, error }),
                Ok(Err(_)) => Err(ChannelError::Transport {
                    message: format!("worker dropped reply to request {}", id),
                }),
                Err(_) => Err(ChannelError::Timeout {
                    op,
                    after: self.config.timeout,
                }),
            },
            Err(e) => Err(e),
        };

        lock(&self.pending).remove(&id);
        result
    }

    fn send(&self, transport: &Transport, envelope: Envelope) -> Result<()> {
        if !self.config.batching {
            return transport
                .send(vec![envelope])
                .map_err(|_| ChannelError::Transport {
                    message: "worker channel closed".to_string(),
                });
        }

        let first = {
            let mut outbox = lock(&self.outbox);
            outbox.push(envelope);
            outbox.len() == 1
        };
        if first {
            let outbox = Arc::clone(&self.outbox);
            let transport = transport.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                let batch = std::mem::take(&mut *lock(&outbox));
                if batch.is_empty() {
                    return;
                }
                let size = batch.len();
                // Dropping the batch drops the reply slots, which the
                // waiting callers observe as transport errors.
                if transport.send(batch).is_err() {
                    tracing::warn!(size, "worker channel closed, batch dropped");
                } else {
                    tracing::trace!(size, "flushed batch");
                }
            });
        }
        Ok(())
    }

    async fn request_direct(&self, op: OpKind, request: Request, transfer: Transfer) -> Result<Reply> {
        match self.direct.get(op) {
            Some(handler) => handler(request, transfer)
                .await
                .map_err(|error| ChannelError::Remote { op, error }),
            None => Err(ChannelError::NoChannel { op }),
        }
    }

    async fn transport(&self) -> Option<Transport> {
        self.transport
            .get_or_init(|| async { self.initialize() })
            .await
            .clone()
    }

    /// Runs once, inside the `OnceCell` initializer. `Initializing` holds for
    /// the duration of the spawner call.
    fn initialize(&self) -> Option<Transport> {
        if !self.config.host.can_spawn() {
            tracing::info!(host = ?self.config.host, "workers unavailable here, running requests inline");
            *lock(&self.state) = ChannelState::Unavailable;
            return None;
        }

        *lock(&self.state) = ChannelState::Initializing;
        match self.spawner.spawn(dispatch_to(&self.observers)) {
            Ok(transport) => {
                *lock(&self.state) = ChannelState::Ready;
                Some(transport)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start worker, running requests inline");
                *lock(&self.state) = ChannelState::Unavailable;
                None
            }
        }
    }
}

fn dispatch_to(observers: &Arc<ObserverRegistry>) -> EventSink {
    let observers = Arc::clone(observers);
    Arc::new(move |batch| {
        observers.dispatch(&batch);
    })
}
