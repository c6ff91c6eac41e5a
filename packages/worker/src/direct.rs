//! Inline handlers used when no worker can be started.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::host::WorkerHost;
use crate::protocol::{OpKind, Reply, Request, Transfer};

pub type DirectFuture = Pin<Box<dyn Future<Output = Result<Reply, RemoteError>> + Send>>;

/// Executes one op on the calling side.
pub type DirectHandler = Arc<dyn Fn(Request, Transfer) -> DirectFuture + Send + Sync>;

/// Per-op fallback table.
#[derive(Clone, Default)]
pub struct DirectHandlers {
    handlers: HashMap<OpKind, DirectHandler>,
}

impl std::fmt::Debug for DirectHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ops: Vec<_> = self.handlers.keys().map(OpKind::as_str).collect();
        ops.sort_unstable();
        f.debug_struct("DirectHandlers").field("ops", &ops).finish()
    }
}

impl DirectHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table covering every op by running `host` inline.
    pub fn with_host(host: Arc<WorkerHost>) -> Self {
        let mut table = Self::new();
        for op in OpKind::ALL {
            let host = Arc::clone(&host);
            let handler: DirectHandler =
                Arc::new(move |request: Request, transfer: Transfer| -> DirectFuture {
                    let host = Arc::clone(&host);
                    Box::pin(async move { host.handle(request, transfer).await })
                });
            table.insert(op, handler);
        }
        table
    }

    pub fn insert(&mut self, op: OpKind, handler: DirectHandler) {
        self.handlers.insert(op, handler);
    }

    pub fn get(&self, op: OpKind) -> Option<DirectHandler> {
        self.handlers.get(&op).cloned()
    }

    pub fn contains(&self, op: OpKind) -> bool {
        self.handlers.contains_key(&op)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_table_covers_every_op() {
        let table = DirectHandlers::with_host(Arc::new(WorkerHost::new(Arc::new(|_| {}))));
        for op in OpKind::ALL {
            assert!(table.contains(op), "missing {}", op);
        }
        assert!(DirectHandlers::new().is_empty());
    }
}
