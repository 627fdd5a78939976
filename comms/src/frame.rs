use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;

type Kind = u8;
const KIND_SIZE: usize = size_of::<Kind>();

const KIND_TEXT: Kind = 0;
const KIND_EVENT: Kind = 1;
const KIND_PING: Kind = 2;
const KIND_PONG: Kind = 3;

/// A `{ "event": ..., "data": ... }` control-plane message.
///
/// Commands travel coordinator to agent inside this shape; the `data`
/// payload is event specific and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope with no payload.
    pub fn bare(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: Value::Null,
        }
    }

    /// Creates an envelope carrying `data`.
    pub fn with_data(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// One wire frame of the control-plane channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Plain-text acknowledgement reply, not a structured event.
    Text(String),
    /// Structured command envelope.
    Event(Envelope),
    /// Transport-level liveness probe.
    Ping,
    /// Reply to a `Ping`.
    Pong,
}

impl Frame {
    fn invalid_kind_byte<T>(byte: u8) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("received an invalid kind byte {byte}"),
        ))
    }

    /// Appends the kind byte and payload of this frame to `buf`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Frame::Text(text) => {
                buf.push(KIND_TEXT);
                buf.extend_from_slice(text.as_bytes());
            }
            Frame::Event(envelope) => {
                buf.push(KIND_EVENT);
                serde_json::to_writer(&mut *buf, envelope)?;
            }
            Frame::Ping => buf.push(KIND_PING),
            Frame::Pong => buf.push(KIND_PONG),
        }

        Ok(())
    }

    /// Decodes one frame out of a full payload buffer.
    pub(crate) fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < KIND_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty frame, missing kind byte",
            ));
        }

        let (kind, rest) = (buf[0], &buf[KIND_SIZE..]);

        match kind {
            KIND_TEXT => {
                let text = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Text(text.to_string()))
            }
            KIND_EVENT => {
                let envelope = serde_json::from_slice(rest)?;
                Ok(Self::Event(envelope))
            }
            KIND_PING => Ok(Self::Ping),
            KIND_PONG => Ok(Self::Pong),
            byte => Self::invalid_kind_byte(byte),
        }
    }
}
