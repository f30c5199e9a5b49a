use crate::gesture::GestureConfig;
use crate::supervisor::SupervisorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "CONDUIT_LISTEN_ADDR";
pub const HOST_ADDR_ENV: &str = "CONDUIT_HOST_ADDR";
pub const LOG_DIR_ENV: &str = "CONDUIT_LOG_DIR";

/// Top-level configuration. Every section may be omitted from the YAML file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub gesture: GestureConfig,
    pub supervisor: SupervisorConfig,
    pub feedback: FeedbackConfig,
    pub pairing: PairingConfig,
    pub link: LinkConfig,
    /// Directory for the JSONL protocol logs. Disabled when unset.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedbackConfig {
    /// How long a transient message stays on the altar. Default: 2000
    #[serde(default = "default_message_ttl_ms")]
    pub message_ttl_ms: u64,
}

fn default_message_ttl_ms() -> u64 {
    2000
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            message_ttl_ms: default_message_ttl_ms(),
        }
    }
}

impl FeedbackConfig {
    pub fn message_ttl(&self) -> Duration {
        Duration::from_millis(self.message_ttl_ms)
    }
}

/// Where the wand page is served; used to build the pairing URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_conduit_path")]
    pub conduit_path: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_conduit_path() -> String {
    "conduit".to_string()
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            conduit_path: default_conduit_path(),
        }
    }
}

/// TCP addresses for the network transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_host_addr")]
    pub host_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7878))
}

fn default_host_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7878))
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            host_addr: default_host_addr(),
        }
    }
}

impl ConduitConfig {
    /// `~/.conduit/config.yaml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory for config")?;
        Ok(home.join(".conduit").join("config.yaml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        Ok(config)
    }

    /// Loads an explicit path (which must exist) or the default path (which
    /// may be missing), then applies environment overrides and validates.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "No config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(LISTEN_ADDR_ENV) {
            self.link.listen_addr = value
                .parse()
                .with_context(|| format!("{} is not a socket address: {}", LISTEN_ADDR_ENV, value))?;
        }
        if let Ok(value) = std::env::var(HOST_ADDR_ENV) {
            self.link.host_addr = value
                .parse()
                .with_context(|| format!("{} is not a socket address: {}", HOST_ADDR_ENV, value))?;
        }
        if let Ok(value) = std::env::var(LOG_DIR_ENV) {
            if !value.trim().is_empty() {
                self.log_dir = Some(PathBuf::from(value));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.gesture.validate()?;
        self.supervisor.validate()?;
        if self.feedback.message_ttl_ms == 0 {
            anyhow::bail!("feedback.message_ttl_ms must be positive");
        }
        if self.pairing.base_url.trim().is_empty() {
            anyhow::bail!("pairing.base_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
