//! Config directory layout.
//!
//! ```text
//! ~/.restyle/
//! ├── restyle.toml
//! ├── styles/<directory>/index.css
//! └── scripts/<directory>/index.js
//! ```

use super::{Application, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "restyle.toml";
pub const STYLES_DIR: &str = "styles";
pub const SCRIPTS_DIR: &str = "scripts";

const DEFAULT_CONFIG: &str = r#"# restyle configuration
#
# [[app]]
# exe = "Discord.exe"
# directory = "discord"
# style = "index.css"
# remove_csp = false

[server]
port = 0
"#;

/// Resolved locations inside the config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub styles: PathBuf,
    pub scripts: PathBuf,
}

impl ConfigPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_file: root.join(CONFIG_FILE),
            styles: root.join(STYLES_DIR),
            scripts: root.join(SCRIPTS_DIR),
            root,
        }
    }

    /// Create missing directories and a default config file.
    ///
    /// Returns `true` if the config file was created.
    pub fn bootstrap(&self) -> Result<bool, ConfigError> {
        for dir in [&self.root, &self.styles, &self.scripts] {
            fs::create_dir_all(dir).map_err(|e| ConfigError::Io(dir.clone(), e))?;
        }
        if self.config_file.exists() {
            return Ok(false);
        }
        fs::write(&self.config_file, DEFAULT_CONFIG)
            .map_err(|e| ConfigError::Io(self.config_file.clone(), e))?;
        Ok(true)
    }

    pub fn style_path(&self, app: &Application) -> PathBuf {
        self.styles.join(&app.directory).join(&app.style)
    }

    pub fn script_path(&self, app: &Application) -> Option<PathBuf> {
        app.script
            .as_ref()
            .map(|script| self.scripts.join(&app.directory).join(script))
    }

    /// Path relative to the config root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
