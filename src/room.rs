//! Room codes and the peer ids derived from them.
//!
//! The host's peer id is a pure function of the room code, so a wand that
//! knows the code (typed in or scanned from the pairing URL) can dial the
//! host without any further rendezvous. Wand ids are random per session.

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used for generated codes. Omits 0/O and 1/I so codes survive
/// being read aloud or copied by hand.
const GENERATED_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated codes.
pub const ROOM_CODE_LEN: usize = 6;

/// Accepted length range when parsing user input.
const MIN_CODE_LEN: usize = 4;
const MAX_CODE_LEN: usize = 8;

/// A short uppercase alphanumeric room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| GENERATED_CHARSET[rng.gen_range(0..GENERATED_CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parses user input: whitespace is trimmed and letters upper-cased.
    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() < MIN_CODE_LEN || code.len() > MAX_CODE_LEN {
            bail!(
                "Room code must be {}-{} characters, got {:?}",
                MIN_CODE_LEN,
                MAX_CODE_LEN,
                input
            );
        }
        if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            bail!("Room code must be alphanumeric, got {:?}", input);
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        RoomCode::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// The host's transport address for a room: `host-<CODE>`.
pub fn host_peer_id(room: &RoomCode) -> String {
    format!("host-{}", room)
}

/// A fresh, unguessable wand address. Never reused across sessions.
pub fn controller_peer_id() -> String {
    format!("wand-{}", uuid::Uuid::new_v4())
}

/// Builds the pairing URL shown (or encoded as a scannable code) on the altar.
pub fn pairing_url(base_url: &str, conduit_path: &str, room: &RoomCode) -> String {
    format!(
        "{}/{}?room={}",
        base_url.trim_end_matches('/'),
        conduit_path.trim_matches('/'),
        room
    )
}

/// Extracts the room code from a pairing URL or a bare `path?room=...` string.
pub fn room_from_url(url: &str) -> Result<RoomCode> {
    let (_, query) = url
        .split_once('?')
        .with_context(|| format!("Pairing URL has no query: {}", url))?;
    let query = query.split('#').next().unwrap_or_default();
    let value = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "room")
        .map(|(_, value)| value)
        .with_context(|| format!("Pairing URL has no room parameter: {}", url))?;
    RoomCode::parse(value)
}

#[cfg(test)]
#[path = "tests/room_tests.rs"]
mod tests;
