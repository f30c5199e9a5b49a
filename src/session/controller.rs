//! Wand-side session driver.
//!
//! Opens a fresh `wand-<uuid>` endpoint, dials `host-<CODE>` and sends its
//! handshake as soon as the link opens. Commands from the recognizer (or any
//! other source) are sent only while Connected; every sent command pulses
//! the local vibration motor. Responses are forwarded to the caller.

use super::{
    next_endpoint_event, next_link_event, sleep_until_opt, Role, Session, SessionOutcome,
    SessionStatus,
};
use crate::feedback::{HapticActuator, VibrationPattern};
use crate::protocol::{Command, DeviceInfo, Response};
use crate::protocol_log::{Direction, ProtocolLog};
use crate::room::{controller_peer_id, host_peer_id, RoomCode};
use crate::supervisor::{
    FailureReason, Supervisor, SupervisorAction, SupervisorConfig, SupervisorInput,
};
use crate::transport::{
    EndpointEvent, LinkEvent, PeerEndpoint, PeerLink, Transport, TransportErrorKind,
};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct ControllerSession {
    transport: Arc<dyn Transport>,
    local_id: String,
    host_id: String,
    supervisor: Supervisor,
    status_rx: watch::Receiver<SessionStatus>,
    device_info: DeviceInfo,
    haptics: Arc<dyn HapticActuator>,
    endpoint: Option<Box<dyn PeerEndpoint>>,
    link: Option<Box<dyn PeerLink>>,
    handshake_deadline: Option<Instant>,
    revert_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    failure: Option<FailureReason>,
    protocol_log: Option<Arc<ProtocolLog>>,
}

impl ControllerSession {
    /// Opens the wand endpoint and dials the altar once. An unreachable altar
    /// is retried from `run`.
    pub async fn create(
        room: RoomCode,
        transport: Arc<dyn Transport>,
        device_info: DeviceInfo,
        haptics: Arc<dyn HapticActuator>,
        config: SupervisorConfig,
    ) -> Result<Self> {
        let local_id = controller_peer_id();
        let host_id = host_peer_id(&room);
        let (supervisor, status_rx) =
            Supervisor::new(Session::new(room, Role::Controller), config);

        let endpoint = transport
            .open(&local_id)
            .await
            .with_context(|| format!("Failed to open {}", local_id))?;

        let mut session = Self {
            transport,
            local_id,
            host_id,
            supervisor,
            status_rx,
            device_info,
            haptics,
            endpoint: Some(endpoint),
            link: None,
            handshake_deadline: None,
            revert_at: None,
            reconnect_at: None,
            failure: None,
            protocol_log: None,
        };
        session.dial().await;
        Ok(session)
    }

    pub fn with_protocol_log(mut self, log: Arc<ProtocolLog>) -> Self {
        self.protocol_log = Some(log);
        self
    }

    pub fn room(&self) -> &RoomCode {
        &self.supervisor.session().room_code
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn status(&self) -> SessionStatus {
        self.supervisor.status()
    }

    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Drives the session until shutdown or failure. Commands arriving while
    /// not Connected are dropped.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        responses: mpsc::UnboundedSender<Response>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionOutcome {
        let mut commands_open = true;
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
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.send_command(command).await,
                    None => commands_open = false,
                },
                event = next_link_event(&mut self.link) => {
                    self.on_link_event(event, &responses).await;
                }
                event = next_endpoint_event(&mut self.endpoint) => {
                    self.on_endpoint_event(event).await;
                }
                _ = sleep_until_opt(self.handshake_deadline) => {
                    self.handshake_deadline = None;
                    info!(host = %self.host_id, "Altar did not confirm the handshake");
                    self.drop_link().await;
                    self.perform(SupervisorInput::TransportError(TransportErrorKind::PeerUnavailable))
                        .await;
                }
                _ = sleep_until_opt(self.revert_at) => {
                    self.revert_at = None;
                    self.perform(SupervisorInput::QuietPeriodElapsed).await;
                    if self.status() == SessionStatus::Waiting {
                        self.dial().await;
                    }
                }
                _ = sleep_until_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    // Only a waiting wand dials; a live link survives endpoint loss
                    if self.status() == SessionStatus::Waiting {
                        self.dial().await;
                    } else {
                        self.reopen_endpoint().await;
                    }
                }
            }
        }
    }

    /// Reopens the local endpoint if it was lost. Returns whether one is open.
    async fn reopen_endpoint(&mut self) -> bool {
        if self.endpoint.is_some() {
            return true;
        }
        match self.transport.open(&self.local_id).await {
            Ok(endpoint) => {
                info!(peer_id = %self.local_id, "Endpoint recreated");
                self.endpoint = Some(endpoint);
                self.perform(SupervisorInput::ReconnectSucceeded).await;
                true
            }
            Err(e) => {
                warn!(peer_id = %self.local_id, error = %e, "Endpoint recreation failed");
                self.perform(SupervisorInput::TransportError(e.kind)).await;
                false
            }
        }
    }

    /// Dials the altar, reopening the local endpoint first if needed.
    async fn dial(&mut self) {
        if !self.reopen_endpoint().await {
            return;
        }
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        match endpoint.connect(&self.host_id).await {
            Ok(link) => {
                debug!(host = %self.host_id, "Dialled altar");
                self.drop_link().await;
                self.link = Some(link);
                self.handshake_deadline =
                    Some(Instant::now() + self.supervisor.config().handshake_timeout());
            }
            Err(e) => {
                warn!(host = %self.host_id, error = %e, "Could not reach altar");
                self.perform(SupervisorInput::TransportError(e.kind)).await;
            }
        }
    }

    async fn send_command(&mut self, command: Command) {
        if self.status() != SessionStatus::Connected {
            debug!(tag = %command.tag(), status = ?self.status(), "Not connected, command dropped");
            return;
        }
        if self.send_text(&command).await && !matches!(command, Command::Handshake { .. }) {
            self.haptics.vibrate(VibrationPattern::Tap);
        }
    }

    /// Returns whether the command left the wand.
    async fn send_text(&mut self, command: &Command) -> bool {
        let text = match command.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode command");
                return false;
            }
        };
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        match link.send(&text).await {
            Ok(()) => {
                if let Some(log) = &self.protocol_log {
                    log.record(self.room().as_str(), Direction::Sent, &text);
                }
                true
            }
            Err(e) => {
                warn!(tag = %command.tag(), error = %e, "Failed to send command");
                false
            }
        }
    }

    async fn on_link_event(
        &mut self,
        event: Option<LinkEvent>,
        responses: &mpsc::UnboundedSender<Response>,
    ) {
        match event {
            Some(LinkEvent::Open) => {
                let handshake = Command::Handshake {
                    device_info: self.device_info.clone(),
                };
                self.send_text(&handshake).await;
            }
            Some(LinkEvent::Data(text)) => self.on_message(&text, responses).await,
            Some(LinkEvent::Error(e)) => warn!(error = %e, "Altar link error"),
            Some(LinkEvent::Close) | None => {
                self.drop_link().await;
                if self.status() == SessionStatus::Connected {
                    info!(host = %self.host_id, "Altar link closed");
                    self.perform(SupervisorInput::ChannelClosed).await;
                } else {
                    // Closed before the handshake: the altar is busy or gone
                    self.perform(SupervisorInput::TransportError(
                        TransportErrorKind::PeerUnavailable,
                    ))
                    .await;
                }
            }
        }
    }

    async fn on_message(&mut self, text: &str, responses: &mpsc::UnboundedSender<Response>) {
        if let Some(log) = &self.protocol_log {
            log.record(self.room().as_str(), Direction::Received, text);
        }
        let response = match Response::decode(text) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Dropping undecodable response");
                return;
            }
        };

        match &response {
            Response::Connected { room_code } if self.status() == SessionStatus::Waiting => {
                if room_code != self.room() {
                    warn!(expected = %self.room(), got = %room_code, "Altar answered for another room");
                    self.drop_link().await;
                    self.perform(SupervisorInput::TransportError(
                        TransportErrorKind::PeerUnavailable,
                    ))
                    .await;
                    return;
                }
                self.handshake_deadline = None;
                self.perform(SupervisorInput::HandshakeComplete).await;
            }
            Response::Connected { .. } => {
                debug!("Duplicate connected response ignored");
                return;
            }
            Response::Vibrate { pattern } => self.haptics.vibrate(*pattern),
            _ => {}
        }
        let _ = responses.send(response);
    }

    async fn on_endpoint_event(&mut self, event: Option<EndpointEvent>) {
        match event {
            Some(EndpointEvent::Incoming(mut link)) => {
                debug!(remote = link.remote_id(), "Wands do not accept inbound links");
                link.close().await;
            }
            Some(EndpointEvent::Error(e)) => {
                warn!(peer_id = %self.local_id, error = %e, "Endpoint error");
                self.close_endpoint().await;
                self.perform(SupervisorInput::TransportError(e.kind)).await;
            }
            Some(EndpointEvent::Disconnected) => {
                self.perform(SupervisorInput::SignallingLost).await;
            }
            None => {
                self.endpoint = None;
                self.perform(SupervisorInput::TransportError(TransportErrorKind::Socket))
                    .await;
            }
        }
    }

    async fn close_endpoint(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take() {
            endpoint.close().await;
        }
    }

    async fn drop_link(&mut self) {
        self.handshake_deadline = None;
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
    }

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
                        if to == SessionStatus::Connected {
                            self.haptics.vibrate(VibrationPattern::Summon);
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
                            Ok(()) => queue.push_back(SupervisorInput::ReconnectSucceeded),
                            Err(e) => {
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
        self.revert_at = None;
        self.reconnect_at = None;
        self.drop_link().await;
        self.close_endpoint().await;
        info!(peer_id = %self.local_id, "Wand session torn down");
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
