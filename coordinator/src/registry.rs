//! Single owner of the live-connection set.
//!
//! Both the per-agent session tasks (insert/remove on connect/disconnect)
//! and the interactive dispatcher (snapshot on every broadcast) go through
//! this registry; the raw container is never exposed to uncoordinated
//! writers.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use comms::Frame;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::CoordinatorError;

/// Write handle for one live agent connection.
///
/// Frames pushed here are forwarded by that connection's session task in
/// arrival order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    addr: SocketAddr,
    tx: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    pub fn new(addr: SocketAddr, tx: mpsc::Sender<Frame>) -> Self {
        Self { addr, tx }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn peer_ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Queues a frame for this agent.
    ///
    /// # Errors
    /// Returns `PeerLost` when the session task is gone.
    pub async fn send(&self, frame: Frame) -> Result<(), CoordinatorError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| CoordinatorError::PeerLost { addr: self.addr })
    }
}

/// Task-safe live-connection set, the coordinator's sole addressing source
/// for broadcast.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<SocketAddr, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection after a successful handshake.
    pub fn insert(&self, handle: ConnectionHandle) {
        self.inner.lock().insert(handle.addr(), handle);
    }

    /// Removes a connection on close, disconnect or explicit kill.
    pub fn remove(&self, addr: &SocketAddr) {
        self.inner.lock().remove(addr);
    }

    /// Snapshot of the live connections for a send batch.
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.inner.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
