//! Style Repository: reads CSS/JS payloads for an application from disk.
//!
//! Reads are synchronous and on demand. A missing or unreadable file yields
//! an empty payload. Content is decoded lossily because it ends up inside
//! JSON messages.

use crate::config::{Application, ConfigPaths};
use crate::debug;
use crate::utils::hash;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub struct StyleRepository {
    paths: ConfigPaths,
    /// Hash of the last published style per executable.
    published: Mutex<FxHashMap<String, u64>>,
}

impl StyleRepository {
    pub fn new(paths: ConfigPaths) -> Self {
        Self {
            paths,
            published: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn get_style(&self, app: &Application) -> String {
        read_payload(&self.paths.style_path(app))
    }

    pub fn get_script(&self, app: &Application) -> String {
        self.paths
            .script_path(app)
            .map(|path| read_payload(&path))
            .unwrap_or_default()
    }

    /// Read the style and return it only if it differs from the last one
    /// returned for this application.
    pub fn changed_style(&self, app: &Application) -> Option<String> {
        let css = self.get_style(app);
        let new_hash = hash::compute(css.as_bytes());
        let mut published = self.published.lock();
        if published.insert(app.exe.clone(), new_hash) == Some(new_hash) {
            return None;
        }
        Some(css)
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }
}

fn read_payload(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("style"; "{}: {}", path.display(), e);
            String::new()
        }
    }
}
