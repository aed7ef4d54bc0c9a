//! Inspector discovery: `GET /json/list` on the local debug port.
//!
//! The endpoint only comes up some time after the debug signal, so the
//! request is retried a bounded number of times with a short pause.

use crate::config::InjectConfig;
use crate::debug;
use serde::Deserialize;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Transport(String),

    #[error("discovery endpoint returned status {0}")]
    Status(u16),

    #[error("malformed discovery response")]
    Malformed(#[source] serde_json::Error),

    #[error("discovery endpoint lists no debuggable targets")]
    Empty,

    #[error("exceeded max retries ({attempts}) locating the debug port, last error: {last}")]
    ExceededRetries { attempts: u32, last: String },
}

#[derive(Debug, Deserialize)]
struct DiscoveryEntry {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Bounded retry loop against the discovery endpoint.
#[derive(Debug, Clone)]
pub struct Discovery {
    url: String,
    attempts: u32,
    interval: Duration,
    client: reqwest::blocking::Client,
}

impl Discovery {
    pub fn new(port: u16, attempts: u32, interval: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(2))
            .no_proxy()
            .build()
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        Ok(Self {
            url: format!("http://127.0.0.1:{port}/json/list"),
            attempts,
            interval,
            client,
        })
    }

    pub fn from_config(config: &InjectConfig) -> Result<Self, DiscoveryError> {
        Self::new(
            config.discovery_port,
            config.discovery_attempts,
            config.discovery_interval(),
        )
    }

    /// Retry until the endpoint yields a debugger URL.
    ///
    /// Returns the URL and the 1-based attempt that produced it.
    pub fn locate(&self) -> Result<(String, u32), DiscoveryError> {
        let mut last = String::new();
        for attempt in 1..=self.attempts {
            match self.attempt() {
                Ok(url) => return Ok((url, attempt)),
                Err(e) => {
                    debug!("inject"; "discovery attempt {}/{}: {}", attempt, self.attempts, e);
                    last = e.to_string();
                }
            }
            if attempt < self.attempts {
                thread::sleep(self.interval);
            }
        }
        Err(DiscoveryError::ExceededRetries {
            attempts: self.attempts,
            last,
        })
    }

    /// One discovery request. The first entry's debugger URL wins.
    pub fn attempt(&self) -> Result<String, DiscoveryError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }
        let body = response
            .text()
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;
        parse_list(&body)
    }
}

/// Only the first entry is decoded; later targets may lack a debugger URL
/// (one is already attached to them).
fn parse_list(body: &str) -> Result<String, DiscoveryError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(DiscoveryError::Malformed)?;
    let first = entries.into_iter().next().ok_or(DiscoveryError::Empty)?;
    let entry: DiscoveryEntry =
        serde_json::from_value(first).map_err(DiscoveryError::Malformed)?;
    Ok(entry.web_socket_debugger_url)
}
