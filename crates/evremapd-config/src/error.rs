use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading and resolving the configuration.
///
/// Any of these is fatal at startup: the daemon never starts with a
/// partially resolved remap table.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown key or button name: {0}")]
    UnknownKey(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
