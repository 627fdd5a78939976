use std::{fmt, io, net::SocketAddr};

/// All errors that can occur in the coordinator.
#[derive(Debug)]
pub enum CoordinatorError {
    /// Invalid main configuration, caught before anything connects.
    InvalidConfig(String),
    /// Failed to reach or keep a connection with an agent.
    ConnectionFailed {
        addr: String,
        source: io::Error,
    },
    /// An agent stopped answering keepalive probes.
    PeerLost { addr: SocketAddr },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ConnectionFailed { addr, source } => {
                write!(f, "connection failed to {addr}: {source}")
            }
            Self::PeerLost { addr } => write!(f, "agent {addr} missed keepalive"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
