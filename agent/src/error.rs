use std::{fmt, io};

/// All errors that can occur in the agent.
#[derive(Debug)]
pub enum AgentError {
    /// A bootstrap environment variable is missing or unreadable.
    MissingEnv(&'static str),
    /// The received local configuration cannot be applied.
    InvalidConfig(String),
    /// Failed to reach or keep the coordinator connection.
    ConnectionFailed { addr: String, source: io::Error },
    /// The coordinator stopped answering keepalive probes.
    PeerLost,
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnv(var) => write!(f, "missing environment variable `{var}`"),
            Self::InvalidConfig(msg) => write!(f, "invalid local config: {msg}"),
            Self::ConnectionFailed { addr, source } => {
                write!(f, "connection failed to {addr}: {source}")
            }
            Self::PeerLost => write!(f, "coordinator missed keepalive"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for AgentError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
