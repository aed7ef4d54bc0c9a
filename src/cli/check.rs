//! `restyle check`: validate the configuration without starting anything.

use crate::config::{ConfigError, ConfigPaths, ServiceConfig};
use crate::log;
use anyhow::{Result, bail};
use std::fs;

/// Everything `check` found, in display order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Load, validate and report. Fails if the config cannot be used.
pub fn check_config(paths: &ConfigPaths) -> Result<()> {
    let report = inspect(paths);
    for warning in &report.warnings {
        log!("warning"; "{}", warning);
    }
    for error in &report.errors {
        log!("error"; "{}", error);
    }
    if !report.errors.is_empty() {
        bail!(
            "{} has {} error(s)",
            paths.config_file.display(),
            report.errors.len()
        );
    }
    log!("config"; "{} is valid", paths.config_file.display());
    Ok(())
}

pub fn inspect(paths: &ConfigPaths) -> Report {
    let mut report = Report::default();
    let config = match fs::read_to_string(&paths.config_file)
        .map_err(|e| ConfigError::Io(paths.config_file.clone(), e))
        .and_then(|content| ServiceConfig::from_content(&content))
    {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            report.errors = errors;
            return report;
        }
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };

    report.warnings = config.warnings();
    for app in config.apps.iter() {
        let style = paths.style_path(app);
        if !style.is_file() {
            report.warnings.push(format!(
                "{}: style file {} not found",
                app.exe,
                paths.relative(&style).display()
            ));
        }
        if let Some(script) = paths.script_path(app).filter(|script| !script.is_file()) {
            report.warnings.push(format!(
                "{}: script file {} not found",
                app.exe,
                paths.relative(&script).display()
            ));
        }
    }
    report
}
