//! Transport failure taxonomy.
//!
//! Errors are classified by kind when they are created, so recovery decisions
//! never depend on matching error strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical transport failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Lost connectivity, refused or timed-out connection.
    Network,
    /// The signalling/broker side failed.
    Server,
    /// Socket-level read/write failure.
    Socket,
    /// The addressed peer is not listening (yet).
    PeerUnavailable,
    /// The requested local peer id is already taken.
    UnavailableId,
    /// The link or endpoint was already closed.
    Closed,
}

impl TransportErrorKind {
    /// Returns true if this failure may clear up on its own and is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::Network
                | TransportErrorKind::Server
                | TransportErrorKind::Socket
                | TransportErrorKind::PeerUnavailable
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TransportErrorKind::Network => "network",
            TransportErrorKind::Server => "server",
            TransportErrorKind::Socket => "socket",
            TransportErrorKind::PeerUnavailable => "peer-unavailable",
            TransportErrorKind::UnavailableId => "unavailable-id",
            TransportErrorKind::Closed => "closed",
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A classified transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Closed, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::AddrInUse | ErrorKind::AddrNotAvailable => TransportErrorKind::UnavailableId,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::TimedOut => TransportErrorKind::Network,
            _ => TransportErrorKind::Socket,
        };
        Self::new(kind, err.to_string())
    }
}
