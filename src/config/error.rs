//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
}

/// An application identity that is not in the current set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("application with executable name `{0}` does not exist")]
    UnknownExecutable(String),

    #[error("application with directory `{0}` does not exist")]
    UnknownDirectory(String),
}
