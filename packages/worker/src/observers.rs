//! Caller-side table of observation handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::protocol::{ChangeBatch, ChangeEvent};

/// Callback receiving the changes for one observation.
pub type ChangeHandler = Arc<dyn Fn(&[ChangeEvent]) + Send + Sync>;

/// Routes incoming change batches to the handler registered for their
/// observation id.
#[derive(Default)]
pub struct ObserverRegistry {
    handlers: Mutex<HashMap<String, ChangeHandler>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observations", &self.len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `id`, replacing any previous handler.
    pub fn register(&self, id: impl Into<String>, handler: ChangeHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), handler);
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Hand `batch` to its handler. Returns false if nobody is listening.
    pub fn dispatch(&self, batch: &ChangeBatch) -> bool {
        // Called outside the lock so handlers may register or unregister.
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&batch.observation)
            .cloned();
        match handler {
            Some(handler) => {
                handler(&batch.changes);
                true
            }
            None => {
                tracing::trace!(observation = %batch.observation, "dropping changes for unknown observation");
                false
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChangeKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_registered_handler_only() {
        let registry = ObserverRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.register(
            "a",
            Arc::new(move |changes: &[ChangeEvent]| {
                counter.fetch_add(changes.len(), Ordering::SeqCst);
            }),
        );

        let batch = ChangeBatch {
            observation: "a".to_string(),
            changes: vec![
                ChangeEvent::new("x", ChangeKind::Created),
                ChangeEvent::new("y", ChangeKind::Deleted),
            ],
        };
        assert!(registry.dispatch(&batch));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let stray = ChangeBatch {
            observation: "b".to_string(),
            changes: vec![],
        };
        assert!(!registry.dispatch(&stray));
    }

    #[test]
    fn handler_may_unregister_itself() {
        let registry = Arc::new(ObserverRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register(
            "once",
            Arc::new(move |_: &[ChangeEvent]| {
                inner.unregister("once");
            }),
        );
        let batch = ChangeBatch {
            observation: "once".to_string(),
            changes: vec![],
        };
        assert!(registry.dispatch(&batch));
        assert!(!registry.contains("once"));
        assert!(registry.is_empty());
    }
}
