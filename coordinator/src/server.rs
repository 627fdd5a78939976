//! Coordinator-side control plane: agent sessions, keepalive, and the
//! broadcast/multicast/directed addressing modes.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use comms::specs::Command;
use comms::{Frame, FrameReceiver, FrameSender};
use futures::future;
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::configs::SystemConfig;
use crate::error::CoordinatorError;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// Fixed request/response keepalive cycle, after which a transport ping is
/// issued and a missing pong counts as peer loss.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

const OUTBOUND_CAPACITY: usize = 16;

/// Owns the live-connection registry and the compiled topology view, and
/// drives every agent through its phases over a persistent channel.
pub struct ControlPlane {
    registry: ConnectionRegistry,
    system: SystemConfig,
    keepalive: Duration,
}

impl ControlPlane {
    /// Creates a control plane around a compiled system configuration.
    ///
    /// # Arguments
    /// * `system` - Train parameters plus records keyed by node address.
    /// * `keepalive` - Ping interval; also the pong deadline.
    pub fn new(system: SystemConfig, keepalive: Duration) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            system,
            keepalive,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Accepts agent connections forever, one session task per agent.
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            let plane = Arc::clone(self);

            tokio::spawn(async move {
                let (rx, tx) = stream.into_split();
                let (rx, tx) = comms::channel(rx, tx);

                if let Err(e) = plane.session(addr, rx, tx).await {
                    warn!("agent {addr} session ended: {e}");
                }
            });
        }
    }

    /// Runs one agent session: registers the connection, forwards queued
    /// commands, answers transport pings and probes the peer's liveness.
    ///
    /// The connection is removed from the registry on any exit path, so
    /// subsequent broadcasts exclude it.
    pub async fn session<R, W>(
        &self,
        addr: SocketAddr,
        rx: FrameReceiver<R>,
        tx: FrameSender<W>,
    ) -> Result<(), CoordinatorError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.registry.insert(ConnectionHandle::new(addr, out_tx));
        info!("new agent connected: {addr}");

        let result = self.drive_session(addr, rx, tx, out_rx).await;

        self.registry.remove(&addr);
        info!("agent {addr} disconnected");
        result
    }

    async fn drive_session<R, W>(
        &self,
        addr: SocketAddr,
        mut rx: FrameReceiver<R>,
        mut tx: FrameSender<W>,
        mut out_rx: mpsc::Receiver<Frame>,
    ) -> Result<(), CoordinatorError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut keepalive = time::interval(self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the first
        // probe happens one full interval after connect.
        keepalive.tick().await;

        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Ok(Frame::Text(ack)) => info!("agent {addr}: {ack}"),
                    Ok(Frame::Ping) => tx.send(&Frame::Pong).await?,
                    Ok(Frame::Pong) => awaiting_pong = false,
                    Ok(Frame::Event(envelope)) => {
                        warn!("ignoring unexpected event `{}` from agent {addr}", envelope.event);
                    }
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                        warn!("ignoring malformed frame from agent {addr}: {e}");
                    }
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                    Err(e) => {
                        return Err(CoordinatorError::ConnectionFailed {
                            addr: addr.to_string(),
                            source: e,
                        });
                    }
                },

                outbound = out_rx.recv() => match outbound {
                    Some(frame) => tx.send(&frame).await?,
                    None => return Ok(()),
                },

                _ = keepalive.tick() => {
                    if awaiting_pong {
                        return Err(CoordinatorError::PeerLost { addr });
                    }
                    tx.send(&Frame::Ping).await?;
                    awaiting_pong = true;
                }
            }
        }
    }

    /// Sends `cmd` to every live connection.
    ///
    /// # Returns
    /// The number of agents the command was delivered to.
    pub async fn broadcast(&self, cmd: Command) -> usize {
        let frame = Frame::Event(cmd.into_envelope());
        let targets = self
            .registry
            .snapshot()
            .into_iter()
            .map(|handle| (handle, frame.clone()))
            .collect();

        self.send_batch(targets).await
    }

    /// Sends `cmd` to live connections whose peer address holds a valid
    /// compiled record.
    ///
    /// # Returns
    /// The number of agents the command was delivered to.
    pub async fn multicast(&self, cmd: Command) -> usize {
        let frame = Frame::Event(cmd.into_envelope());
        let targets = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|handle| match handle.peer_ip() {
                IpAddr::V4(ip) => self.system.is_participant(&ip),
                IpAddr::V6(_) => false,
            })
            .map(|handle| (handle, frame.clone()))
            .collect();

        self.send_batch(targets).await
    }

    /// Pushes each participant its own record merged with the shared train
    /// parameters. Peers without a compiled record are skipped.
    ///
    /// # Returns
    /// The number of agents a record was delivered to.
    pub async fn update_local_config(&self) -> usize {
        let targets = self
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|handle| {
                let IpAddr::V4(ip) = handle.peer_ip() else {
                    return None;
                };

                let cfg = self.system.local_config_for(&ip)?;
                let envelope = Command::UpdateLocalConfig(Box::new(cfg)).into_envelope();
                Some((handle, Frame::Event(envelope)))
            })
            .collect();

        self.send_batch(targets).await
    }

    /// Issues all sends concurrently and awaits them as a single batch; a
    /// failed target is logged and does not block delivery to the others.
    async fn send_batch(&self, targets: Vec<(ConnectionHandle, Frame)>) -> usize {
        let sends = targets.into_iter().map(|(handle, frame)| async move {
            let addr = handle.addr();
            (addr, handle.send(frame).await)
        });

        let mut delivered = 0;
        for (addr, result) in future::join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!("delivery to agent {addr} failed: {e}"),
            }
        }

        delivered
    }
}
