//! Short-lived acknowledgements on both ends of the link.
//!
//! The altar shows a transient message after most commands; the wand pulses
//! its vibration motor on every command it sends and whenever the altar asks
//! for a pattern.

use crate::protocol::DeviceInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Named vibration patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibrationPattern {
    /// Local confirmation of a sent command
    Tap,
    Soft,
    Pulse,
    Summon,
    Oracle,
}

impl VibrationPattern {
    /// Alternating on/off durations in milliseconds, starting with "on".
    pub fn sequence_ms(&self) -> &'static [u64] {
        match self {
            VibrationPattern::Tap => &[10],
            VibrationPattern::Soft => &[20, 40, 20],
            VibrationPattern::Pulse => &[50, 50, 50],
            VibrationPattern::Summon => &[100, 50, 100, 50, 200],
            VibrationPattern::Oracle => &[30, 60, 30, 60, 30, 60, 300],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VibrationPattern::Tap => "tap",
            VibrationPattern::Soft => "soft",
            VibrationPattern::Pulse => "pulse",
            VibrationPattern::Summon => "summon",
            VibrationPattern::Oracle => "oracle",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransientMessage {
    pub text: String,
    pub expires_at: Instant,
}

/// Altar-side message slot. Showing a message replaces the current one and
/// re-arms the dismissal deadline.
#[derive(Debug)]
pub struct FeedbackChannel {
    ttl: Duration,
    current: Option<TransientMessage>,
}

impl FeedbackChannel {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn show(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(message = %text, "Feedback shown");
        self.current = Some(TransientMessage {
            text,
            expires_at: Instant::now() + self.ttl,
        });
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|m| m.text.as_str())
    }

    /// When the current message should be dismissed, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|m| m.expires_at)
    }

    /// Clears the message if its deadline has passed. Returns whether it did.
    pub fn dismiss_expired(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(message) if message.expires_at <= now => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Drives the wand's vibration motor.
pub trait HapticActuator: Send + Sync {
    fn vibrate(&self, pattern: VibrationPattern);
}

/// For devices without a motor.
#[derive(Debug, Default)]
pub struct NoopHaptics;

impl HapticActuator for NoopHaptics {
    fn vibrate(&self, _pattern: VibrationPattern) {}
}

/// Logs patterns instead of vibrating; used by the CLI wand.
#[derive(Debug, Default)]
pub struct TracingHaptics;

impl HapticActuator for TracingHaptics {
    fn vibrate(&self, pattern: VibrationPattern) {
        tracing::info!(pattern = pattern.as_str(), sequence = ?pattern.sequence_ms(), "Vibrate");
    }
}

pub fn haptics_for(device: &DeviceInfo) -> Arc<dyn HapticActuator> {
    if device.has_vibration {
        Arc::new(TracingHaptics)
    } else {
        Arc::new(NoopHaptics)
    }
}

#[cfg(test)]
#[path = "tests/feedback_tests.rs"]
mod tests;
