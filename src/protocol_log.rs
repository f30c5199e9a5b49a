//! JSONL record of every protocol message a session sends or receives.
//!
//! One line per message:
//! - `seq`: monotonic per log
//! - `ts`: ISO 8601 with microseconds
//! - `room`, `direction` (`sent` / `received`)
//! - `message`: the decoded JSON payload, or the raw text if it was not JSON

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProtocolLogEntry {
    pub seq: u64,
    pub ts: String,
    pub room: String,
    pub direction: Direction,
    pub message: Value,
}

pub struct ProtocolLog {
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

impl ProtocolLog {
    /// Appends to `<logs_dir>/<role>-protocol.jsonl`, creating the directory.
    pub fn new(logs_dir: &Path, role: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join(format!("{}-protocol.jsonl", role));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Records one message. Write failures are ignored; the log is best effort.
    pub fn record(&self, room: &str, direction: Direction, text: &str) {
        let message =
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
        let entry = ProtocolLogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            room: room.to_string(),
            direction,
            message,
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_log_tests.rs"]
mod tests;
