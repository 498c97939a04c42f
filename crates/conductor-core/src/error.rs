//! Error types for core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while parsing a checklist.
#[derive(Error, Debug)]
pub enum ChecklistError {
    /// The document could not be decoded as UTF-8 text.
    #[error("checklist is not valid UTF-8 text: {0}")]
    NotText(#[from] std::str::Utf8Error),
}

/// Errors that can occur while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for the expected schema.
    #[error("failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A field holds an unusable value.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

/// Result type alias for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
