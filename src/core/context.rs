//! Top-level service context.
//!
//! Built once at startup and handed to every component by reference or
//! `Arc` clone. Components never reach for ambient globals.

use crate::config::{ConfigHandle, ConfigPaths, ServiceConfig};
use crate::inject::WorkQueue;
use crate::log;
use crate::style::StyleRepository;
use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Context {
    pub config: Arc<ConfigHandle>,
    pub styles: Arc<StyleRepository>,
    pub queue: Arc<WorkQueue>,
}

impl Context {
    /// Bootstrap the config directory and load the configuration.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let paths = ConfigPaths::new(config_dir);
        if paths
            .bootstrap()
            .context("Failed to prepare config directory")?
        {
            log!("config"; "created {}", paths.config_file.display());
        }
        let handle = ConfigHandle::load(paths).context("Failed to load configuration")?;
        Ok(Self::with_handle(handle))
    }

    /// Build a context around an in-memory config.
    pub fn from_config(paths: ConfigPaths, config: ServiceConfig) -> Self {
        Self::with_handle(ConfigHandle::from_config(paths, config))
    }

    fn with_handle(handle: ConfigHandle) -> Self {
        let styles = StyleRepository::new(handle.paths().clone());
        Self {
            config: Arc::new(handle),
            styles: Arc::new(styles),
            queue: Arc::new(WorkQueue::new()),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<ServiceConfig> {
        self.config.snapshot()
    }
}
