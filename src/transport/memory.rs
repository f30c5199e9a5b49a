//! In-process transport.
//!
//! Peers register their id in a shared registry; dialling an id hands the
//! listener one half of a [`ChannelLink`] pair. Faults (endpoint errors, lost
//! registration) can be injected to exercise recovery paths.

use super::{
    ChannelLink, EndpointEvent, PeerEndpoint, PeerLink, Transport, TransportError,
    TransportErrorKind,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

type Registry = HashMap<String, mpsc::UnboundedSender<EndpointEvent>>;

/// A shared in-process peer network. Clones address the same registry.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    registry: Arc<Mutex<Registry>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `peer_id` is currently registered by a live endpoint.
    pub fn is_registered(&self, peer_id: &str) -> bool {
        self.with_registry(|registry| {
            registry
                .get(peer_id)
                .map(|tx| !tx.is_closed())
                .unwrap_or(false)
        })
    }

    /// Delivers an endpoint error to `peer_id`. Returns false if nobody listens there.
    pub fn inject_error(&self, peer_id: &str, kind: TransportErrorKind) -> bool {
        self.with_registry(|registry| match registry.get(peer_id) {
            Some(tx) => tx
                .send(EndpointEvent::Error(TransportError::new(
                    kind,
                    "injected endpoint failure",
                )))
                .is_ok(),
            None => false,
        })
    }

    /// Drops the registration of `peer_id` and tells its endpoint it was
    /// disconnected. The endpoint stays usable and may `reconnect()`.
    pub fn drop_registration(&self, peer_id: &str) -> bool {
        self.with_registry(|registry| match registry.remove(peer_id) {
            Some(tx) => tx.send(EndpointEvent::Disconnected).is_ok(),
            None => false,
        })
    }

    fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let mut guard = match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn register(
        &self,
        local_id: &str,
        tx: &mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<(), TransportError> {
        self.with_registry(|registry| {
            if let Some(existing) = registry.get(local_id) {
                if !existing.is_closed() && !existing.same_channel(tx) {
                    return Err(TransportError::new(
                        TransportErrorKind::UnavailableId,
                        format!("peer id {} is already taken", local_id),
                    ));
                }
            }
            registry.insert(local_id.to_string(), tx.clone());
            Ok(())
        })
    }

    fn unregister(&self, local_id: &str, tx: &mpsc::UnboundedSender<EndpointEvent>) {
        self.with_registry(|registry| {
            if registry
                .get(local_id)
                .map(|existing| existing.same_channel(tx))
                .unwrap_or(false)
            {
                registry.remove(local_id);
            }
        });
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn open(&self, local_id: &str) -> Result<Box<dyn PeerEndpoint>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(local_id, &tx)?;
        debug!(peer_id = local_id, "Memory endpoint registered");
        Ok(Box::new(MemoryEndpoint {
            local_id: local_id.to_string(),
            network: self.clone(),
            registration: tx,
            events: rx,
            closed: false,
        }))
    }
}

struct MemoryEndpoint {
    local_id: String,
    network: MemoryNetwork,
    registration: mpsc::UnboundedSender<EndpointEvent>,
    events: mpsc::UnboundedReceiver<EndpointEvent>,
    closed: bool,
}

#[async_trait]
impl PeerEndpoint for MemoryEndpoint {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    async fn next_event(&mut self) -> Option<EndpointEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    async fn connect(&mut self, remote_id: &str) -> Result<Box<dyn PeerLink>, TransportError> {
        if self.closed {
            return Err(TransportError::closed("endpoint already closed"));
        }
        let listener = self
            .network
            .with_registry(|registry| registry.get(remote_id).cloned());
        let listener = listener.ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::PeerUnavailable,
                format!("no peer registered as {}", remote_id),
            )
        })?;

        let (local, remote) = ChannelLink::pair(&self.local_id, remote_id);
        listener
            .send(EndpointEvent::Incoming(Box::new(remote)))
            .map_err(|_| {
                TransportError::new(
                    TransportErrorKind::PeerUnavailable,
                    format!("peer {} stopped listening", remote_id),
                )
            })?;
        Ok(Box::new(local))
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::closed("endpoint already closed"));
        }
        self.network.register(&self.local_id, &self.registration)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.network.unregister(&self.local_id, &self.registration);
            self.events.close();
            debug!(peer_id = %self.local_id, "Memory endpoint closed");
        }
    }
}

impl Drop for MemoryEndpoint {
    fn drop(&mut self) {
        self.network.unregister(&self.local_id, &self.registration);
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
