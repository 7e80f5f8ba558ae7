//! Routing key → handler map.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::handler::{ErasedHandler, Handler, MessageHandler};

/// Maps routing keys to handlers.
///
/// Lookups take a shared lock and registrations an exclusive one, so
/// handlers can be added while traffic is flowing. The lock is never held
/// across an `.await`: [`lookup`](Self::lookup) clones the `Arc` out and
/// releases it before the handler runs.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<String, Arc<dyn ErasedHandler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed handler under its header's routing key.
    ///
    /// A handler already registered under the same key is replaced and
    /// returned. The header is not validated; a header without an action
    /// just produces a key no client will send.
    pub fn register<H: Handler>(
        &self,
        handler: MessageHandler<H>,
    ) -> Option<Arc<dyn ErasedHandler>> {
        self.register_erased(Arc::new(handler))
    }

    /// Registers an already type-erased handler.
    pub fn register_erased(
        &self,
        handler: Arc<dyn ErasedHandler>,
    ) -> Option<Arc<dyn ErasedHandler>> {
        let key = handler.header().key();
        tracing::debug!(%key, "registering handler");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handler)
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<dyn ErasedHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered routing keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
