//! `[[app]]` entries and the lookup set built from them.
//!
//! # Example
//!
//! ```toml
//! [[app]]
//! exe = "Discord.exe"       # executable name (primary key)
//! directory = "discord"     # directory key under styles/ and scripts/
//! style = "index.css"       # relative to styles/<directory>/
//! script = "index.js"       # optional, relative to scripts/<directory>/
//! remove_csp = false
//! ```
//!
//! Both keys are expected to be unique. Duplicates are reported as warnings
//! and the first entry wins on lookup.

use super::LookupError;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::PathBuf;

/// One configured application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Application {
    /// Executable name, matched exactly against running processes.
    pub exe: String,

    /// Directory key under `styles/` and `scripts/`.
    pub directory: String,

    /// Stylesheet, relative to `styles/<directory>/`.
    #[serde(default = "default_style")]
    pub style: PathBuf,

    /// Optional script, relative to `scripts/<directory>/`.
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Strip Content-Security-Policy headers in the target.
    #[serde(default)]
    pub remove_csp: bool,
}

fn default_style() -> PathBuf {
    PathBuf::from("index.css")
}

impl Application {
    pub fn new(exe: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            exe: exe.into(),
            directory: directory.into(),
            style: default_style(),
            script: None,
            remove_csp: false,
        }
    }
}

/// Immutable application set with first-match-wins lookups.
///
/// Replaced wholesale on config reload, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct AppSet {
    apps: Vec<Application>,
    by_exe: FxHashMap<String, usize>,
    by_directory: FxHashMap<String, usize>,
    duplicates: Vec<String>,
}

impl From<Vec<Application>> for AppSet {
    fn from(apps: Vec<Application>) -> Self {
        let mut by_exe = FxHashMap::default();
        let mut by_directory = FxHashMap::default();
        let mut duplicates = Vec::new();

        for (i, app) in apps.iter().enumerate() {
            if by_exe.contains_key(&app.exe) {
                duplicates.push(format!("app[{i}].exe: duplicate `{}`", app.exe));
            } else {
                by_exe.insert(app.exe.clone(), i);
            }
            if by_directory.contains_key(&app.directory) {
                duplicates.push(format!(
                    "app[{i}].directory: duplicate `{}`",
                    app.directory
                ));
            } else {
                by_directory.insert(app.directory.clone(), i);
            }
        }

        Self {
            apps,
            by_exe,
            by_directory,
            duplicates,
        }
    }
}

impl<'de> Deserialize<'de> for AppSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Application>::deserialize(deserializer).map(Self::from)
    }
}

impl AppSet {
    pub fn by_exe(&self, exe: &str) -> Result<&Application, LookupError> {
        self.by_exe
            .get(exe)
            .map(|&i| &self.apps[i])
            .ok_or_else(|| LookupError::UnknownExecutable(exe.to_string()))
    }

    pub fn by_directory(&self, directory: &str) -> Result<&Application, LookupError> {
        self.by_directory
            .get(directory)
            .map(|&i| &self.apps[i])
            .ok_or_else(|| LookupError::UnknownDirectory(directory.to_string()))
    }

    /// Whether a process with this executable name should be injected.
    #[inline]
    pub fn is_watched(&self, exe: &str) -> bool {
        self.by_exe.contains_key(exe)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Application> {
        self.apps.iter()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Duplicate key descriptions, in config order.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    fn set(apps: &[(&str, &str)]) -> AppSet {
        apps.iter()
            .map(|(exe, dir)| Application::new(*exe, *dir))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_lookup_by_both_keys() {
        let apps = set(&[("Discord.exe", "discord"), ("Slack.exe", "slack")]);

        assert_eq!(apps.by_exe("Slack.exe").unwrap().directory, "slack");
        assert_eq!(apps.by_directory("discord").unwrap().exe, "Discord.exe");
        assert!(apps.is_watched("Discord.exe"));
        assert!(!apps.is_watched("discord.exe"));
    }

    #[test]
    fn test_unknown_keys() {
        let apps = set(&[("Discord.exe", "discord")]);

        assert_eq!(
            apps.by_exe("other.exe"),
            Err(LookupError::UnknownExecutable("other.exe".into()))
        );
        assert_eq!(
            apps.by_directory("other"),
            Err(LookupError::UnknownDirectory("other".into()))
        );
    }

    #[test]
    fn test_duplicates_first_match_wins() {
        let apps = set(&[
            ("app.exe", "first"),
            ("app.exe", "second"),
            ("other.exe", "first"),
        ]);

        assert_eq!(apps.len(), 3);
        assert_eq!(apps.by_exe("app.exe").unwrap().directory, "first");
        assert_eq!(apps.by_directory("first").unwrap().exe, "app.exe");
        assert_eq!(apps.duplicates().len(), 2);
        assert!(apps.duplicates()[0].contains("app[1].exe"));
        assert!(apps.duplicates()[1].contains("app[2].directory"));
    }

    #[test]
    fn test_app_entry_defaults() {
        let config = test_parse_config("[[app]]\nexe = \"app.exe\"\ndirectory = \"app\"");
        let app = config.apps.by_exe("app.exe").unwrap();

        assert_eq!(app.style, PathBuf::from("index.css"));
        assert_eq!(app.script, None);
        assert!(!app.remove_csp);
    }

    #[test]
    fn test_app_entry_full() {
        let config = test_parse_config(
            "[[app]]\nexe = \"app.exe\"\ndirectory = \"app\"\nstyle = \"dark.css\"\nscript = \"main.js\"\nremove_csp = true",
        );
        let app = config.apps.by_directory("app").unwrap();

        assert_eq!(app.style, PathBuf::from("dark.css"));
        assert_eq!(app.script, Some(PathBuf::from("main.js")));
        assert!(app.remove_csp);
    }
}
