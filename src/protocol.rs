//! Wire vocabulary between wand and altar.
//!
//! Every message is a single JSON object tagged by `"type"`. Commands flow
//! wand -> altar, responses altar -> wand; the two sets are disjoint.

use crate::collaborators::ContentItem;
use crate::feedback::VibrationPattern;
use crate::gesture::{Gesture, Shape, SwipeDirection};
use crate::room::RoomCode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    Phone,
    Tablet,
    Desktop,
}

/// Capabilities a wand announces in its handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub form_factor: FormFactor,
    pub has_orientation: bool,
    pub has_acceleration: bool,
    pub has_vibration: bool,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl DeviceInfo {
    /// A desktop browser: no motion sensors, no vibration.
    pub fn desktop() -> Self {
        Self {
            form_factor: FormFactor::Desktop,
            has_orientation: false,
            has_acceleration: false,
            has_vibration: false,
            screen_width: 1280,
            screen_height: 800,
        }
    }

    pub fn phone() -> Self {
        Self {
            form_factor: FormFactor::Phone,
            has_orientation: true,
            has_acceleration: true,
            has_vibration: true,
            screen_width: 390,
            screen_height: 844,
        }
    }
}

/// Messages sent from the wand to the altar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "handshake", rename_all = "camelCase")]
    Handshake { device_info: DeviceInfo },

    #[serde(rename = "gesture:shake")]
    Shake { intensity: f64 },
    #[serde(rename = "gesture:swipe")]
    Swipe {
        direction: SwipeDirection,
        distance: f64,
        /// Milliseconds
        duration: u64,
    },
    #[serde(rename = "gesture:tilt")]
    Tilt { x: f64, y: f64 },
    #[serde(rename = "gesture:tap")]
    Tap { count: u32 },
    #[serde(rename = "gesture:hold")]
    Hold,
    #[serde(rename = "gesture:draw")]
    Draw { shape: Shape },

    #[serde(rename = "navigate:random")]
    NavigateRandom,
    #[serde(rename = "navigate:path")]
    NavigatePath { path: String },

    /// Relative change in reading progress, in percent.
    #[serde(rename = "reading:scroll")]
    Scroll { delta: f64 },
    #[serde(rename = "reading:pause")]
    Pause,

    #[serde(rename = "oracle:divine")]
    Divine {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    #[serde(rename = "oracle:whisper")]
    Whisper { message: String },

    #[serde(rename = "atmosphere:sound")]
    Sound { level: f64 },
    #[serde(rename = "atmosphere:dim")]
    Dim,
    #[serde(rename = "atmosphere:brighten")]
    Brighten,

    #[serde(rename = "voice:command")]
    Voice { text: String },
}

/// Dispatch key for a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    Handshake,
    Shake,
    Swipe,
    Tilt,
    Tap,
    Hold,
    Draw,
    NavigateRandom,
    NavigatePath,
    Scroll,
    Pause,
    Divine,
    Whisper,
    Sound,
    Dim,
    Brighten,
    Voice,
}

impl CommandTag {
    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandTag::Handshake => "handshake",
            CommandTag::Shake => "gesture:shake",
            CommandTag::Swipe => "gesture:swipe",
            CommandTag::Tilt => "gesture:tilt",
            CommandTag::Tap => "gesture:tap",
            CommandTag::Hold => "gesture:hold",
            CommandTag::Draw => "gesture:draw",
            CommandTag::NavigateRandom => "navigate:random",
            CommandTag::NavigatePath => "navigate:path",
            CommandTag::Scroll => "reading:scroll",
            CommandTag::Pause => "reading:pause",
            CommandTag::Divine => "oracle:divine",
            CommandTag::Whisper => "oracle:whisper",
            CommandTag::Sound => "atmosphere:sound",
            CommandTag::Dim => "atmosphere:dim",
            CommandTag::Brighten => "atmosphere:brighten",
            CommandTag::Voice => "voice:command",
        }
    }
}

impl std::fmt::Display for CommandTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::Handshake { .. } => CommandTag::Handshake,
            Command::Shake { .. } => CommandTag::Shake,
            Command::Swipe { .. } => CommandTag::Swipe,
            Command::Tilt { .. } => CommandTag::Tilt,
            Command::Tap { .. } => CommandTag::Tap,
            Command::Hold => CommandTag::Hold,
            Command::Draw { .. } => CommandTag::Draw,
            Command::NavigateRandom => CommandTag::NavigateRandom,
            Command::NavigatePath { .. } => CommandTag::NavigatePath,
            Command::Scroll { .. } => CommandTag::Scroll,
            Command::Pause => CommandTag::Pause,
            Command::Divine { .. } => CommandTag::Divine,
            Command::Whisper { .. } => CommandTag::Whisper,
            Command::Sound { .. } => CommandTag::Sound,
            Command::Dim => CommandTag::Dim,
            Command::Brighten => CommandTag::Brighten,
            Command::Voice { .. } => CommandTag::Voice,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to encode command")
    }

    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).with_context(|| format!("Invalid command: {}", text))
    }
}

impl From<Gesture> for Command {
    fn from(gesture: Gesture) -> Self {
        match gesture {
            Gesture::Shake { intensity } => Command::Shake { intensity },
            Gesture::Tilt { x, y } => Command::Tilt { x, y },
            Gesture::Tap { count } => Command::Tap { count },
            Gesture::Hold => Command::Hold,
            Gesture::Swipe {
                direction,
                distance,
                duration_ms,
            } => Command::Swipe {
                direction,
                distance,
                duration: duration_ms,
            },
            Gesture::Draw(shape) => Command::Draw { shape },
        }
    }
}

/// Messages sent from the altar to the wand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { room_code: RoomCode },

    #[serde(rename = "state:writing")]
    Writing { item: ContentItem },
    /// Reading progress in percent, 0..=100.
    #[serde(rename = "state:reading")]
    Reading { progress: f64 },

    #[serde(rename = "oracle:result")]
    OracleResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<ContentItem>,
        message: String,
    },
    #[serde(rename = "oracle:response")]
    OracleResponse {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quote: Option<String>,
    },

    #[serde(rename = "feedback:vibrate")]
    Vibrate { pattern: VibrationPattern },
}

impl Response {
    pub fn tag(&self) -> &'static str {
        match self {
            Response::Connected { .. } => "connected",
            Response::Writing { .. } => "state:writing",
            Response::Reading { .. } => "state:reading",
            Response::OracleResult { .. } => "oracle:result",
            Response::OracleResponse { .. } => "oracle:response",
            Response::Vibrate { .. } => "feedback:vibrate",
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to encode response")
    }

    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).with_context(|| format!("Invalid response: {}", text))
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
