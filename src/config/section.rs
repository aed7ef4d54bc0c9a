//! `[server]`, `[inject]` and `[watch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 0                  # 0 = automatic
//!
//! [inject]
//! warmup_ms = 1500          # grace period before signalling the debugger
//! discovery_port = 9229     # inspector discovery endpoint
//! discovery_attempts = 30
//! discovery_interval_ms = 20
//! reply_timeout_ms = 10000  # abandon the job when a reply takes longer
//!
//! [watch]
//! poll_interval_ms = 1000   # process table poll interval
//! ```

use serde::Deserialize;
use std::time::Duration;

/// Style broadcast server settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port. `0` picks one automatically.
    pub port: u16,
}

/// Injection pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InjectConfig {
    pub warmup_ms: u64,
    pub discovery_port: u16,
    pub discovery_attempts: u32,
    pub discovery_interval_ms: u64,
    pub reply_timeout_ms: u64,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 1500,
            discovery_port: 9229,
            discovery_attempts: 30,
            discovery_interval_ms: 20,
            reply_timeout_ms: 10_000,
        }
    }
}

impl InjectConfig {
    #[inline]
    pub const fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    #[inline]
    pub const fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    #[inline]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Process watcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl WatchConfig {
    #[inline]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
