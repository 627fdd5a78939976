use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Frame, LEN_TYPE_SIZE, LenType};

/// The receiving end handle of the communication.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    /// Creates a new `FrameReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive a new frame from the inner reader.
    ///
    /// # Returns
    /// A result object that returns `Frame` on success or `io::Error` on
    /// failure. An `io::Error` here means the peer is gone or spoke an
    /// unknown framing, the connection should be torn down either way.
    pub async fn recv(&mut self) -> io::Result<Frame> {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf) as usize;

        self.buf.resize(len, 0);
        self.rx.read_exact(&mut self.buf).await?;

        Frame::decode(&self.buf)
    }
}
