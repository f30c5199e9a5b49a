//! Peer-link abstraction used by both session roles.
//!
//! A [`Transport`] opens a [`PeerEndpoint`] under a peer id. Endpoints accept
//! inbound [`PeerLink`]s and dial outbound ones. Every link delivers typed
//! [`LinkEvent`]s through `receive()`, starting with `Open`, and is released
//! with an explicit `close()`.
//!
//! Links are reliable and ordered. Events are fed through channels by the
//! implementation, so `receive()` is safe to race inside `tokio::select!`.
//!
//! ## Implementations
//!
//! - **`memory`**: in-process network with fault injection (tests, `conduit demo`).
//! - **`tcp`**: newline-delimited JSON over TCP (`conduit host` / `conduit wand`).

pub mod error;
pub mod memory;
pub mod tcp;

pub use error::{TransportError, TransportErrorKind};
pub use memory::MemoryNetwork;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Events observed on a single peer link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The link is ready to carry messages.
    Open,
    /// One complete message.
    Data(String),
    /// The remote side closed the link (or vanished).
    Close,
    /// The link failed; a `Close` follows.
    Error(TransportError),
}

/// Events observed on a listening endpoint.
pub enum EndpointEvent {
    /// A remote peer dialled this endpoint.
    Incoming(Box<dyn PeerLink>),
    /// The endpoint failed.
    Error(TransportError),
    /// The endpoint lost its registration but can be re-registered in place.
    Disconnected,
}

impl std::fmt::Debug for EndpointEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointEvent::Incoming(link) => write!(f, "Incoming({})", link.remote_id()),
            EndpointEvent::Error(e) => write!(f, "Error({})", e),
            EndpointEvent::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// One reliable, ordered, bidirectional message channel to a remote peer.
#[async_trait]
pub trait PeerLink: Send {
    fn remote_id(&self) -> &str;

    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Next event, or `None` once the link has been closed locally.
    async fn receive(&mut self) -> Option<LinkEvent>;

    async fn close(&mut self);
}

/// A locally registered peer id.
#[async_trait]
pub trait PeerEndpoint: Send {
    fn local_id(&self) -> &str;

    /// Next endpoint event, or `None` once the endpoint is gone.
    async fn next_event(&mut self) -> Option<EndpointEvent>;

    async fn connect(&mut self, remote_id: &str) -> Result<Box<dyn PeerLink>, TransportError>;

    /// Re-register the existing endpoint after a `Disconnected` event.
    async fn reconnect(&mut self) -> Result<(), TransportError>;

    async fn close(&mut self);
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, local_id: &str) -> Result<Box<dyn PeerEndpoint>, TransportError>;
}

/// Channel-backed link shared by the memory and TCP transports.
///
/// `outbound` carries `Data`/`Close` towards the remote side (or its writer
/// task); `inbound` is fed by the remote side (or a reader task).
pub struct ChannelLink {
    remote_id: String,
    outbound: mpsc::UnboundedSender<LinkEvent>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
    closed: bool,
}

impl ChannelLink {
    pub(crate) fn new(
        remote_id: impl Into<String>,
        outbound: mpsc::UnboundedSender<LinkEvent>,
        inbound: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            outbound,
            inbound,
            closed: false,
        }
    }

    /// Creates two connected links, each already holding an `Open` event.
    ///
    /// The first link is held by `a_id` and addresses `b_id`; the second is
    /// its mirror image.
    pub(crate) fn pair(a_id: &str, b_id: &str) -> (ChannelLink, ChannelLink) {
        let (to_a, a_inbound) = mpsc::unbounded_channel();
        let (to_b, b_inbound) = mpsc::unbounded_channel();
        let _ = to_a.send(LinkEvent::Open);
        let _ = to_b.send(LinkEvent::Open);
        (
            ChannelLink::new(b_id, to_b, a_inbound),
            ChannelLink::new(a_id, to_a, b_inbound),
        )
    }
}

#[async_trait]
impl PeerLink for ChannelLink {
    fn remote_id(&self) -> &str {
        &self.remote_id
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::closed("link already closed"));
        }
        self.outbound
            .send(LinkEvent::Data(message.to_string()))
            .map_err(|_| TransportError::closed(format!("{} dropped the link", self.remote_id)))
    }

    async fn receive(&mut self) -> Option<LinkEvent> {
        if self.closed {
            return None;
        }
        match self.inbound.recv().await {
            Some(LinkEvent::Close) | None => {
                self.closed = true;
                Some(LinkEvent::Close)
            }
            Some(event) => Some(event),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.outbound.send(LinkEvent::Close);
            self.inbound.close();
        }
    }
}

#[cfg(test)]
#[path = "tests/link_tests.rs"]
mod tests;
