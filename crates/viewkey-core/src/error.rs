//! Core error types for the viewkey service.
//!
//! This module defines the central error type shared by the parser, the job
//! manager and the CLI.

use thiserror::Error;

/// Central error type for viewkey operations.
#[derive(Error, Debug)]
pub enum ViewKeyError {
    /// Loading or validating `config.toml` failed
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (missing key, bad birthday, malformed id)
    #[error("validation error: {0}")]
    Validation(String),

    /// Filesystem failure outside configuration handling
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Broken internal invariant
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading, validating or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home directory to place `config.toml` under
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// `config.toml` is not valid TOML for [`crate::AppConfig`]
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config or creating data directories
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `ViewKeyError`.
pub type Result<T> = std::result::Result<T, ViewKeyError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
