//! Shared config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement.
//! Readers hold an `Arc<ServiceConfig>` snapshot, so a reload never changes
//! a configuration somebody is already working with.

use super::{ConfigError, ConfigPaths, ServiceConfig};
use crate::utils::hash;
use arc_swap::ArcSwap;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Owned handle to the current configuration.
#[derive(Debug)]
pub struct ConfigHandle {
    paths: ConfigPaths,
    current: ArcSwap<ServiceConfig>,
    /// Hash of the config file content the current snapshot was built from.
    hash: AtomicU64,
}

impl ConfigHandle {
    /// Load the config file under `paths`.
    pub fn load(paths: ConfigPaths) -> Result<Self, ConfigError> {
        let (config, content_hash) = Self::read(&paths)?;
        config.report_warnings();
        Ok(Self {
            paths,
            current: ArcSwap::from_pointee(config),
            hash: AtomicU64::new(content_hash),
        })
    }

    /// Wrap an already built config (no file backing until the first reload).
    pub fn from_config(paths: ConfigPaths, config: ServiceConfig) -> Self {
        Self {
            paths,
            current: ArcSwap::from_pointee(config),
            hash: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<ServiceConfig> {
        self.current.load_full()
    }

    #[inline]
    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Reload config from disk if content changed.
    ///
    /// Returns `Ok(true)` if config was updated, `Ok(false)` if unchanged.
    /// On error the previous config stays in place.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let content = fs::read_to_string(&self.paths.config_file)
            .map_err(|e| ConfigError::Io(self.paths.config_file.clone(), e))?;
        let new_hash = hash::compute(content.as_bytes());
        if new_hash == self.hash.load(Ordering::Relaxed) {
            return Ok(false);
        }

        let config = ServiceConfig::from_content(&content)?;
        config.report_warnings();
        self.current.store(Arc::new(config));
        self.hash.store(new_hash, Ordering::Relaxed);
        Ok(true)
    }

    /// Replace the current config directly.
    #[cfg(test)]
    pub fn store(&self, config: ServiceConfig) {
        self.current.store(Arc::new(config));
    }

    fn read(paths: &ConfigPaths) -> Result<(ServiceConfig, u64), ConfigError> {
        let content = fs::read_to_string(&paths.config_file)
            .map_err(|e| ConfigError::Io(paths.config_file.clone(), e))?;
        let config = ServiceConfig::from_content(&content)?;
        Ok((config, hash::compute(content.as_bytes())))
    }
}
