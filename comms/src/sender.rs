//! The sending end of the control-plane channel.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{Frame, LEN_TYPE_SIZE, LenType};

/// The sending end handle of the communication.
pub struct FrameSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    /// Creates a new `FrameSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::new(),
        }
    }

    /// Sends `frame` through the inner writer.
    ///
    /// # Arguments
    /// * `frame` - The frame to send.
    ///
    /// # Returns
    /// A result object that returns `io::Error` on failure.
    pub async fn send(&mut self, frame: &Frame) -> io::Result<()> {
        let Self { buf, tx } = self;

        buf.clear();
        buf.resize(LEN_TYPE_SIZE, 0);
        frame.encode(buf)?;

        let len = (buf.len() - LEN_TYPE_SIZE) as LenType;
        buf[..LEN_TYPE_SIZE].copy_from_slice(&len.to_be_bytes());

        tx.write_all(buf).await?;
        tx.flush().await
    }
}
