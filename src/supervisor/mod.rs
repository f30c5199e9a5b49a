//! Connection supervisor.
//!
//! The only place session status changes. Drivers feed it what they observe
//! on the transport and carry out the actions it returns; it never touches
//! the network or the clock itself.
//!
//! ```text
//! Waiting --HandshakeComplete--> Connected --ChannelClosed--> Disconnected
//!    ^                                                             |
//!    +------------------------QuietPeriodElapsed-------------------+
//! ```
//!
//! Transport errors are classified by kind: retryable ones schedule a
//! reconnect until the retry cap, fatal ones fail the session at once.

pub mod policy;

pub use policy::{RetryPolicy, SupervisorConfig};

use crate::session::{Session, SessionStatus};
use crate::transport::TransportErrorKind;
use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// What a session driver observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorInput {
    /// The wand's handshake was accepted (or the altar confirmed ours).
    HandshakeComplete,
    /// The active link closed.
    ChannelClosed,
    /// The revert timer scheduled by `ScheduleRevert` fired.
    QuietPeriodElapsed,
    TransportError(TransportErrorKind),
    /// The endpoint lost its registration but is otherwise intact.
    SignallingLost,
    /// A scheduled reconnect brought the endpoint back.
    ReconnectSucceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Fatal(TransportErrorKind),
    RetriesExhausted { attempts: u32 },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Fatal(kind) => write!(f, "fatal {} error", kind),
            FailureReason::RetriesExhausted { attempts } => {
                write!(f, "gave up after {} reconnect attempts", attempts)
            }
        }
    }
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Feed `QuietPeriodElapsed` after this delay.
    ScheduleRevert(Duration),
    /// Recreate the endpoint (or redial) after `delay`.
    ScheduleReconnect { attempt: u32, delay: Duration },
    /// Re-register the existing endpoint now.
    Reconnect,
    /// Tear the session down.
    Fail(FailureReason),
}

pub struct Supervisor {
    session: Session,
    config: SupervisorConfig,
    attempts: u32,
    failed: bool,
    status_tx: watch::Sender<SessionStatus>,
}

impl Supervisor {
    /// Returns the supervisor and a receiver that tracks every status change.
    pub fn new(session: Session, config: SupervisorConfig) -> (Self, watch::Receiver<SessionStatus>) {
        let (status_tx, status_rx) = watch::channel(session.status);
        let supervisor = Self {
            session,
            config,
            attempts: 0,
            failed: false,
            status_tx,
        };
        (supervisor, status_rx)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Reconnect attempts since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// All status changes go through this method. Inputs that are invalid
    /// for the current status are rejected without side effects.
    pub fn apply(&mut self, input: SupervisorInput) -> Result<Vec<SupervisorAction>> {
        if self.failed {
            bail!("Session {} has already failed", self.session.room_code);
        }
        let actions = self.apply_internal(input)?;

        for action in &actions {
            match action {
                SupervisorAction::StatusChanged { from, to } => {
                    info!(room = %self.session.room_code, role = ?self.session.role, ?from, ?to, "Session status changed");
                    let _ = self.status_tx.send(*to);
                }
                SupervisorAction::Fail(reason) => {
                    warn!(room = %self.session.room_code, %reason, "Session failed");
                }
                _ => {}
            }
        }
        Ok(actions)
    }

    fn apply_internal(&mut self, input: SupervisorInput) -> Result<Vec<SupervisorAction>> {
        use SupervisorAction::*;
        use SupervisorInput::*;

        match input {
            HandshakeComplete => {
                let from = self.session.status;
                self.session.transition(SessionStatus::Connected)?;
                self.attempts = 0;
                Ok(vec![StatusChanged {
                    from,
                    to: self.session.status,
                }])
            }

            ChannelClosed => {
                // A pending link closing before its handshake changes nothing
                if self.session.status != SessionStatus::Connected {
                    return Ok(vec![]);
                }
                let from = self.session.status;
                self.session.transition(SessionStatus::Disconnected)?;
                Ok(vec![
                    StatusChanged {
                        from,
                        to: self.session.status,
                    },
                    ScheduleRevert(self.config.quiet_period()),
                ])
            }

            QuietPeriodElapsed => {
                let from = self.session.status;
                self.session.transition(SessionStatus::Waiting)?;
                Ok(vec![StatusChanged {
                    from,
                    to: self.session.status,
                }])
            }

            TransportError(kind) if !kind.is_retryable() => {
                self.failed = true;
                Ok(vec![Fail(FailureReason::Fatal(kind))])
            }

            TransportError(kind) => {
                if self.attempts >= self.config.retry.max_attempts {
                    self.failed = true;
                    return Ok(vec![Fail(FailureReason::RetriesExhausted {
                        attempts: self.attempts,
                    })]);
                }
                self.attempts += 1;
                let delay = self.config.retry.delay_for(self.attempts);
                warn!(
                    room = %self.session.room_code,
                    %kind,
                    attempt = self.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient transport error, reconnect scheduled"
                );
                Ok(vec![ScheduleReconnect {
                    attempt: self.attempts,
                    delay,
                }])
            }

            SignallingLost => Ok(vec![Reconnect]),

            ReconnectSucceeded => {
                self.attempts = 0;
                Ok(vec![])
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/supervisor_tests.rs"]
mod tests;
