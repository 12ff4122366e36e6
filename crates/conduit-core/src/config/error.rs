use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or validating engine settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported config format for {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to deserialize config: {0}")]
    Deserialization(String),

    #[error("Failed to serialize config: {0}")]
    Serialization(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
