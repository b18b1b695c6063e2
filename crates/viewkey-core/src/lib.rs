//! Viewkey Core - Foundation crate for the viewing-key import service.
//!
//! This crate provides shared types, error handling and configuration
//! management that the report parser and the job manager depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`ViewingKey`, `WalletSlug`, `JobId`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use viewkey_core::{AppConfig, ViewingKey, WalletSlug};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let key = ViewingKey::new("uview1examplekeymaterial")?;
//! let slug = WalletSlug::derive(&key);
//! let wallet_dir = config.paths.wallet_dir(&slug);
//! assert!(wallet_dir.ends_with(slug.as_str()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, JobsConfig, PathsConfig, ToolConfig, ToolMode};
pub use error::{ConfigError, ConfigResult, Result, ViewKeyError};
pub use types::{BirthdayHeight, JobId, Timestamp, ViewingKey, WalletSlug};
