//! The agent's control loop over the coordinator channel.

use std::io;
use std::time::Duration;

use comms::specs::Command;
use comms::{Frame, FrameReceiver, FrameSender};
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{self, MissedTickBehavior};

use crate::error::AgentError;
use crate::handler::{CommandHandler, Flow};

/// Fixed request/response keepalive cycle, after which a transport ping is
/// issued and a missing pong counts as coordinator loss.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Receives coordinator commands until told to stop or the channel closes.
///
/// Malformed frames and unknown events are logged and skipped; the channel
/// closing from the coordinator side ends the loop cleanly.
///
/// # Errors
/// Returns `PeerLost` when the coordinator misses a keepalive probe, or the
/// transport error that tore the channel down.
pub async fn run<R, W>(
    mut rx: FrameReceiver<R>,
    mut tx: FrameSender<W>,
    handler: &mut CommandHandler,
    keepalive: Duration,
) -> Result<(), AgentError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut probe = time::interval(keepalive);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the first probe
    // happens one full interval after connect.
    probe.tick().await;

    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(Frame::Event(envelope)) => {
                    let cmd = match Command::try_from(&envelope) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            warn!("ignoring event `{}`: {e}", envelope.event);
                            continue;
                        }
                    };

                    match handler.handle(cmd) {
                        Ok(Flow::Continue(Some(ack))) => {
                            tx.send(&Frame::Text(ack)).await?;
                        }
                        Ok(Flow::Continue(None)) => {}
                        Ok(Flow::Stop) => {
                            info!("coordinator asked us to stop");
                            return Ok(());
                        }
                        Err(e) => warn!("command `{}` failed: {e}", envelope.event),
                    }
                }
                Ok(Frame::Ping) => tx.send(&Frame::Pong).await?,
                Ok(Frame::Pong) => awaiting_pong = false,
                Ok(Frame::Text(text)) => {
                    warn!("ignoring unexpected text frame: {text}");
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("ignoring malformed frame: {e}");
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    info!("coordinator closed the channel");
                    return Ok(());
                }
                Err(e) => return Err(AgentError::Io(e)),
            },

            _ = probe.tick() => {
                if awaiting_pong {
                    return Err(AgentError::PeerLost);
                }
                tx.send(&Frame::Ping).await?;
                awaiting_pong = true;
            }
        }
    }
}
