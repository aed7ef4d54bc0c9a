//! `restyle apps`: list configured applications.

use crate::config::{Application, ConfigPaths, ServiceConfig};
use owo_colors::{OwoColorize, Stream};
use std::fmt::Write as _;
use std::path::Path;

/// Print one block per application with its resolved files.
pub fn list_apps(config: &ServiceConfig, paths: &ConfigPaths) {
    if config.apps.is_empty() {
        println!("no applications configured in {}", paths.config_file.display());
        return;
    }
    for app in config.apps.iter() {
        print!("{}", describe_app(app, paths));
    }
}

fn describe_app(app: &Application, paths: &ConfigPaths) -> String {
    let mut out = String::new();
    let exe = app.exe.if_supports_color(Stream::Stdout, |t| t.bold());
    let _ = writeln!(out, "{} ({})", exe, app.directory);
    let _ = writeln!(out, "  style:  {}", file_status(&paths.style_path(app), paths));
    match paths.script_path(app) {
        Some(script) => {
            let _ = writeln!(out, "  script: {}", file_status(&script, paths));
        }
        None => {
            let _ = writeln!(out, "  script: -");
        }
    }
    if app.remove_csp {
        let note = "removes Content-Security-Policy";
        let _ = writeln!(out, "  {}", note.if_supports_color(Stream::Stdout, |t| t.yellow()));
    }
    out
}

fn file_status(path: &Path, paths: &ConfigPaths) -> String {
    let shown = paths.relative(path).display().to_string();
    if path.is_file() {
        shown
    } else {
        let missing = "(missing)";
        format!("{} {}", shown, missing.if_supports_color(Stream::Stdout, |t| t.red()))
    }
}
