//! Altar-side session driver.
//!
//! Listens as `host-<CODE>`, accepts one wand at a time, completes its
//! handshake and feeds every later command through the dispatcher. The
//! listening endpoint outlives individual wands and is only closed on
//! teardown or when the transport asks for it to be recreated.

use super::{
    next_endpoint_event, next_link_event, sleep_until_opt, Role, Session, SessionOutcome,
    SessionStatus,
};
use crate::dispatcher::{Dispatcher, HostContext};
use crate::protocol::{Command, DeviceInfo, Response};
use crate::protocol_log::{Direction, ProtocolLog};
use crate::room::{host_peer_id, RoomCode};
use crate::supervisor::{
    FailureReason, Supervisor, SupervisorAction, SupervisorConfig, SupervisorInput,
};
use crate::transport::{
    EndpointEvent, LinkEvent, PeerEndpoint, PeerLink, Transport, TransportErrorKind,
};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct HostSession {
    transport: Arc<dyn Transport>,
    peer_id: String,
    supervisor: Supervisor,
    status_rx: watch::Receiver<SessionStatus>,
    dispatcher: Dispatcher,
    context: HostContext,
    endpoint: Option<Box<dyn PeerEndpoint>>,
    /// The handshaken wand, or a pending one while Waiting.
    link: Option<Box<dyn PeerLink>>,
    device: Option<DeviceInfo>,
    handshake_deadline: Option<Instant>,
    revert_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    failure: Option<FailureReason>,
    protocol_log: Option<Arc<ProtocolLog>>,
}

impl HostSession {
    /// Opens the listening endpoint for `room`. An id that is already taken
    /// is an error; transient failures are retried from `run`.
    pub async fn create(
        room: RoomCode,
        transport: Arc<dyn Transport>,
        dispatcher: Dispatcher,
        context: HostContext,
        config: SupervisorConfig,
    ) -> Result<Self> {
        let peer_id = host_peer_id(&room);
        let (supervisor, status_rx) = Supervisor::new(Session::new(room, Role::Host), config);
        let mut session = Self {
            transport,
            peer_id,
            supervisor,
            status_rx,
            dispatcher,
            context,
            endpoint: None,
            link: None,
            device: None,
            handshake_deadline: None,
            revert_at: None,
            reconnect_at: None,
            failure: None,
            protocol_log: None,
        };

        match session.transport.open(&session.peer_id).await {
            Ok(endpoint) => {
                info!(peer_id = %session.peer_id, "Altar listening");
                session.endpoint = Some(endpoint);
            }
            Err(e) if e.is_retryable() => {
                warn!(peer_id = %session.peer_id, error = %e, "Could not open endpoint yet");
                session.perform(SupervisorInput::TransportError(e.kind)).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", session.peer_id));
            }
        }
        Ok(session)
    }

    pub fn with_protocol_log(mut self, log: Arc<ProtocolLog>) -> Self {
        self.protocol_log = Some(log);
        self
    }

    pub fn room(&self) -> &RoomCode {
        &self.supervisor.session().room_code
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn status(&self) -> SessionStatus {
        self.supervisor.status()
    }

    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    pub fn context(&self) -> &HostContext {
        &self.context
    }

    /// Capabilities of the connected wand.
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Drives the session until shutdown is signalled (or its sender is
    /// dropped) or the supervisor gives up.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> SessionOutcome {
        loop {
            if let Some(reason) = self.failure {
                self.teardown().await;
                return SessionOutcome::Failed(reason);
            }
            if *shutdown.borrow() {
                self.teardown().await;
                return SessionOutcome::Shutdown;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        self.teardown().await;
                        return SessionOutcome::Shutdown;
                    }
                }
                event = next_endpoint_event(&mut self.endpoint) => {
                    self.on_endpoint_event(event).await;
                }
                event = next_link_event(&mut self.link) => {
                    self.on_link_event(event).await;
                }
                _ = sleep_until_opt(self.handshake_deadline) => {
                    self.handshake_deadline = None;
                    if let Some(mut link) = self.link.take() {
                        info!(remote = link.remote_id(), "Handshake timed out, closing link");
                        link.close().await;
                    }
                }
                _ = sleep_until_opt(self.revert_at) => {
                    self.revert_at = None;
                    self.perform(SupervisorInput::QuietPeriodElapsed).await;
                }
                _ = sleep_until_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.reopen_endpoint().await;
                }
                _ = sleep_until_opt(self.context.feedback.deadline()) => {
                    self.context.feedback.dismiss_expired(Instant::now());
                }
            }
        }
    }

    async fn on_endpoint_event(&mut self, event: Option<EndpointEvent>) {
        match event {
            Some(EndpointEvent::Incoming(link)) => self.accept(link).await,
            Some(EndpointEvent::Error(e)) => {
                warn!(peer_id = %self.peer_id, error = %e, "Endpoint error");
                self.close_endpoint().await;
                self.perform(SupervisorInput::TransportError(e.kind)).await;
            }
            Some(EndpointEvent::Disconnected) => {
                warn!(peer_id = %self.peer_id, "Endpoint lost its registration");
                self.perform(SupervisorInput::SignallingLost).await;
            }
            None => {
                self.endpoint = None;
                self.perform(SupervisorInput::TransportError(TransportErrorKind::Socket))
                    .await;
            }
        }
    }

    async fn accept(&mut self, mut link: Box<dyn PeerLink>) {
        if self.status() != SessionStatus::Waiting {
            info!(remote = link.remote_id(), status = ?self.status(), "Rejecting additional wand");
            link.close().await;
            return;
        }
        if let Some(mut pending) = self.link.take() {
            debug!(remote = pending.remote_id(), "Pending wand replaced by a newer one");
            pending.close().await;
        }
        debug!(remote = link.remote_id(), "Wand link pending handshake");
        self.handshake_deadline = Some(Instant::now() + self.supervisor.config().handshake_timeout());
        self.link = Some(link);
    }

    async fn on_link_event(&mut self, event: Option<LinkEvent>) {
        match event {
            Some(LinkEvent::Open) => debug!("Wand link open"),
            Some(LinkEvent::Data(text)) => self.on_message(&text).await,
            Some(LinkEvent::Error(e)) => warn!(error = %e, "Wand link error"),
            Some(LinkEvent::Close) | None => {
                if let Some(mut link) = self.link.take() {
                    info!(remote = link.remote_id(), "Wand link closed");
                    link.close().await;
                }
                self.handshake_deadline = None;
                self.device = None;
                self.perform(SupervisorInput::ChannelClosed).await;
            }
        }
    }

    async fn on_message(&mut self, text: &str) {
        if let Some(log) = &self.protocol_log {
            log.record(self.room().as_str(), Direction::Received, text);
        }

        if self.status() != SessionStatus::Connected {
            match Command::decode(text) {
                Ok(Command::Handshake { device_info }) => {
                    self.handshake_deadline = None;
                    self.perform(SupervisorInput::HandshakeComplete).await;
                    if self.status() == SessionStatus::Connected {
                        info!(form_factor = ?device_info.form_factor, "Wand connected");
                        self.device = Some(device_info);
                        self.context.feedback.show("Wand connected");
                        let room_code = self.room().clone();
                        self.send(Response::Connected { room_code }).await;
                    }
                }
                Ok(other) => warn!(tag = %other.tag(), "Command before handshake dropped"),
                Err(e) => warn!(error = %format!("{:#}", e), "Dropping undecodable message"),
            }
            return;
        }

        if let Some(response) = self.dispatcher.dispatch_text(text, &mut self.context).await {
            self.send(response).await;
        }
    }

    async fn send(&mut self, response: Response) {
        let text = match response.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode response");
                return;
            }
        };
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match link.send(&text).await {
            Ok(()) => {
                if let Some(log) = &self.protocol_log {
                    log.record(self.room().as_str(), Direction::Sent, &text);
                }
            }
            Err(e) => warn!(tag = response.tag(), error = %e, "Failed to send response"),
        }
    }

    async fn reopen_endpoint(&mut self) {
        if self.endpoint.is_some() {
            return;
        }
        match self.transport.open(&self.peer_id).await {
            Ok(endpoint) => {
                info!(peer_id = %self.peer_id, "Endpoint recreated");
                self.endpoint = Some(endpoint);
                self.perform(SupervisorInput::ReconnectSucceeded).await;
            }
            Err(e) => {
                warn!(peer_id = %self.peer_id, error = %e, "Endpoint recreation failed");
                self.perform(SupervisorInput::TransportError(e.kind)).await;
            }
        }
    }

    async fn close_endpoint(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take() {
            endpoint.close().await;
        }
    }

    /// Feeds the supervisor and carries out its actions, including any
    /// inputs those actions produce.
    async fn perform(&mut self, input: SupervisorInput) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            let actions = match self.supervisor.apply(input) {
                Ok(actions) => actions,
                Err(e) => {
                    warn!(?input, error = %e, "Supervisor rejected input");
                    continue;
                }
            };
            for action in actions {
                match action {
                    SupervisorAction::StatusChanged { to, .. } => {
                        if to == SessionStatus::Disconnected {
                            self.context.feedback.show("Wand disconnected");
                        }
                    }
                    SupervisorAction::ScheduleRevert(delay) => {
                        self.revert_at = Some(Instant::now() + delay);
                    }
                    SupervisorAction::ScheduleReconnect { delay, .. } => {
                        self.reconnect_at = Some(Instant::now() + delay);
                    }
                    SupervisorAction::Reconnect => {
                        let Some(endpoint) = self.endpoint.as_mut() else {
                            continue;
                        };
                        match endpoint.reconnect().await {
                            Ok(()) => {
                                info!(peer_id = %self.peer_id, "Endpoint re-registered");
                                queue.push_back(SupervisorInput::ReconnectSucceeded);
                            }
                            Err(e) => {
                                warn!(peer_id = %self.peer_id, error = %e, "Re-registration failed");
                                if e.is_retryable() {
                                    self.close_endpoint().await;
                                }
                                queue.push_back(SupervisorInput::TransportError(e.kind));
                            }
                        }
                    }
                    SupervisorAction::Fail(reason) => self.failure = Some(reason),
                }
            }
        }
    }

    async fn teardown(&mut self) {
        self.handshake_deadline = None;
        self.revert_at = None;
        self.reconnect_at = None;
        self.context.feedback.clear();
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.close_endpoint().await;
        info!(peer_id = %self.peer_id, "Altar session torn down");
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
