//! Retry and timing configuration for the connection supervisor.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how patiently transient transport errors are retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Reconnect attempts before the session fails. Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before attempt n is `delays_ms[min(n - 1, len - 1)]`. Default: [5000]
    #[serde(default = "default_delays_ms")]
    pub delays_ms: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delays_ms() -> Vec<u64> {
    vec![5000]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_ms: default_delays_ms(),
        }
    }
}

impl RetryPolicy {
    /// A fixed delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delays_ms: vec![delay.as_millis() as u64],
        }
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) - 1) as usize;
        let ms = self
            .delays_ms
            .get(index)
            .or_else(|| self.delays_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("supervisor.retry.max_attempts must be at least 1");
        }
        if self.delays_ms.is_empty() {
            anyhow::bail!("supervisor.retry.delays_ms must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Time spent Disconnected before accepting a new wand. Default: 3000
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
    /// An opened link must handshake within this time. Default: 10000
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_quiet_period_ms() -> u64 {
    3000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SupervisorConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.handshake_timeout_ms == 0 {
            anyhow::bail!("supervisor.handshake_timeout_ms must be positive");
        }
        self.retry.validate()
    }
}
