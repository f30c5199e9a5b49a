//! Session model and the two session drivers.
//!
//! Each device process owns exactly one [`Session`], held by its driver:
//! [`HostSession`] on the altar and [`ControllerSession`] on the wand. Drivers
//! run a single `tokio::select!` loop over their endpoint, link, timers and a
//! shutdown signal; every status change goes through the
//! [`Supervisor`](crate::supervisor::Supervisor).

pub mod controller;
pub mod host;

pub use controller::ControllerSession;
pub use host::HostSession;

use crate::room::RoomCode;
use crate::supervisor::FailureReason;
use crate::transport::{EndpointEvent, LinkEvent, PeerEndpoint, PeerLink};
use anyhow::Result;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Controller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Connected,
    Disconnected,
}

impl SessionStatus {
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        matches!(
            (self, to),
            (SessionStatus::Waiting, SessionStatus::Connected)
                | (SessionStatus::Connected, SessionStatus::Disconnected)
                | (SessionStatus::Disconnected, SessionStatus::Waiting)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room_code: RoomCode,
    pub role: Role,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(room_code: RoomCode, role: Role) -> Self {
        Self {
            room_code,
            role,
            status: SessionStatus::Waiting,
        }
    }

    pub fn transition(&mut self, to: SessionStatus) -> Result<()> {
        if self.status.can_transition_to(to) {
            self.status = to;
            Ok(())
        } else {
            anyhow::bail!(
                "Invalid session transition from {:?} to {:?}",
                self.status,
                to
            )
        }
    }
}

/// How a driver's `run` loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The shutdown signal fired.
    Shutdown,
    Failed(FailureReason),
}

/// Next event from an optional link; never resolves without one.
pub(crate) async fn next_link_event(link: &mut Option<Box<dyn PeerLink>>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.receive().await,
        None => std::future::pending().await,
    }
}

/// Next event from an optional endpoint; never resolves without one.
pub(crate) async fn next_endpoint_event(
    endpoint: &mut Option<Box<dyn PeerEndpoint>>,
) -> Option<EndpointEvent> {
    match endpoint {
        Some(endpoint) => endpoint.next_event().await,
        None => std::future::pending().await,
    }
}

/// Sleeps until `deadline`; never resolves without one.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
