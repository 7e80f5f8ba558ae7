//! Connection-scoped context handed to every handler.
//!
//! One [`ConnectionContext`] exists per connection. Every message on that
//! connection sees the same context, so a value stored while handling one
//! message (or by the server's `on_connect` hook) is visible to the next.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use courier_transport::{Connection, ConnectionId};

type ContextValue = Arc<dyn Any + Send + Sync>;

struct Inner {
    id: ConnectionId,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    values: RwLock<HashMap<String, ContextValue>>,
}

/// Key/value context plus addressing for one connection.
///
/// Cloning is cheap; clones share the same values.
///
/// ```rust
/// use courier::ConnectionContext;
/// use courier_transport::ConnectionId;
///
/// let ctx = ConnectionContext::new(ConnectionId::new(1), None, None);
/// ctx.with_value("nsid", String::from("a"));
///
/// let nsid = ctx.value::<String>("nsid").unwrap();
/// assert_eq!(nsid.as_str(), "a");
/// assert!(ctx.value::<u64>("nsid").is_none()); // wrong type
/// ```
#[derive(Clone)]
pub struct ConnectionContext {
    inner: Arc<Inner>,
}

impl ConnectionContext {
    pub fn new(
        id: ConnectionId,
        local_addr: Option<SocketAddr>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                local_addr,
                remote_addr,
                values: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates the context for an accepted connection.
    pub fn for_connection<C: Connection>(conn: &C) -> Self {
        Self::new(conn.id(), conn.local_addr(), conn.remote_addr())
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Returns the value stored under `key` if it has type `T`.
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self
            .inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        value.downcast::<T>().ok()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn with_value<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> &Self {
        self.inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
        self
    }

    /// Removes the value under `key`. Returns `true` if there was one.
    pub fn remove_value(&self, key: &str) -> bool {
        self.inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("id", &self.inner.id)
            .field("local_addr", &self.inner.local_addr)
            .field("remote_addr", &self.inner.remote_addr)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ConnectionContext {
        ConnectionContext::new(
            ConnectionId::new(9),
            Some("127.0.0.1:8080".parse().unwrap()),
            Some("10.0.0.2:51000".parse().unwrap()),
        )
    }

    #[test]
    fn test_addresses_and_id() {
        let ctx = ctx();
        assert_eq!(ctx.id(), ConnectionId::new(9));
        assert_eq!(ctx.local_addr().unwrap().port(), 8080);
        assert_eq!(ctx.remote_addr().unwrap().to_string(), "10.0.0.2:51000");
    }

    #[test]
    fn test_values_are_shared_between_clones() {
        let a = ctx();
        let b = a.clone();
        a.with_value("count", 3u32).with_value("name", "x");
        assert_eq!(b.value::<u32>("count").as_deref(), Some(&3));
        assert_eq!(b.value::<&str>("name").as_deref(), Some(&"x"));
    }

    #[test]
    fn test_replace_and_remove() {
        let ctx = ctx();
        ctx.with_value("k", 1u8);
        ctx.with_value("k", String::from("now a string"));
        assert!(ctx.value::<u8>("k").is_none());
        assert_eq!(ctx.value::<String>("k").unwrap().as_str(), "now a string");
        assert!(ctx.remove_value("k"));
        assert!(!ctx.remove_value("k"));
        assert!(ctx.value::<String>("k").is_none());
    }
}
