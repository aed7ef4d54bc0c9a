//! Service configuration management for `restyle.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── app        # [[app]] entries, AppSet lookups
//! ├── error      # ConfigError, LookupError
//! ├── handle     # ConfigHandle (copy-and-swap reload)
//! ├── paths      # Config directory layout and bootstrap
//! ├── section    # [server], [inject], [watch]
//! └── mod.rs     # ServiceConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[server]`  | Style broadcast server port                      |
//! | `[inject]`  | Warm-up, discovery budget, reply timeout         |
//! | `[watch]`   | Process table poll interval                      |
//! | `[[app]]`   | Applications to inject (exe, directory, payloads) |

mod app;
mod error;
mod handle;
mod paths;
mod section;

pub use app::{AppSet, Application};
pub use error::{ConfigError, LookupError};
pub use handle::ConfigHandle;
pub use paths::ConfigPaths;
pub use section::{InjectConfig, ServerConfig, WatchConfig};

use crate::log;
use serde::Deserialize;

/// Root configuration structure representing restyle.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Style broadcast server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Injection pipeline settings
    #[serde(default)]
    pub inject: InjectConfig,

    /// Process watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Configured applications
    #[serde(default, rename = "app")]
    pub apps: AppSet,

    /// Unknown keys found while parsing (internal use only)
    #[serde(skip)]
    pub ignored: Vec<String>,
}

impl ServiceConfig {
    /// Parse and validate config file content.
    pub fn from_content(content: &str) -> Result<Self, ConfigError> {
        let (mut config, ignored) = Self::parse(content)?;
        config.ignored = ignored;
        config.validate()?;
        Ok(config)
    }

    /// Parse config, collecting unknown field paths.
    pub(crate) fn parse(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.inject.discovery_attempts == 0 {
            errors.push("inject.discovery_attempts: must be greater than 0".to_string());
        }
        if self.inject.reply_timeout_ms == 0 {
            errors.push("inject.reply_timeout_ms: must be greater than 0".to_string());
        }
        if self.watch.poll_interval_ms == 0 {
            errors.push("watch.poll_interval_ms: must be greater than 0".to_string());
        }
        for (i, app) in self.apps.iter().enumerate() {
            if app.exe.trim().is_empty() {
                errors.push(format!("app[{i}].exe: must not be empty"));
            }
            if app.directory.trim().is_empty() {
                errors.push(format!("app[{i}].directory: must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Non-fatal findings: unknown keys, duplicate app keys, CSP removal.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .ignored
            .iter()
            .map(|field| format!("unknown field `{field}` ignored"))
            .collect();
        warnings.extend(
            self.apps
                .duplicates()
                .iter()
                .map(|dup| format!("{dup} (first entry wins)")),
        );
        warnings.extend(self.apps.iter().filter(|app| app.remove_csp).map(|app| {
            format!(
                "{} will have its Content-Security-Policy removed to allow unsafe CSS @imports",
                app.exe
            )
        }));
        warnings
    }

    pub fn report_warnings(&self) {
        for warning in self.warnings() {
            log!("warning"; "{}", warning);
        }
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> ServiceConfig {
    let (parsed, ignored) = ServiceConfig::parse(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
