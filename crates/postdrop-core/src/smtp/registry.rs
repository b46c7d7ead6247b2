//! Live connection registry
//!
//! Each accepted connection registers its session context here under a
//! monotonically increasing id. The registry is the single owner of the
//! contexts; the connection task holds an `Arc` handle and detaches on
//! close, so a context never outlives its connection by more than the
//! final detach.

use super::session::SessionContext;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Session contexts of currently open connections, keyed by connection id
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, Arc<Mutex<SessionContext>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh session for a connection from `remote_ip`
    pub async fn attach(&self, remote_ip: IpAddr) -> (u64, Arc<Mutex<SessionContext>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let context = Arc::new(Mutex::new(SessionContext::new(remote_ip)));
        self.sessions.lock().await.insert(id, context.clone());
        debug!(connection_id = id, %remote_ip, "session attached");
        (id, context)
    }

    pub async fn get(&self, id: u64) -> Option<Arc<Mutex<SessionContext>>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Remove a closed connection's session
    pub async fn detach(&self, id: u64) {
        if self.sessions.lock().await.remove(&id).is_some() {
            debug!(connection_id = id, "session detached");
        }
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
