//! Configuration management for viewkey.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{BirthdayHeight, WalletSlug};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/viewkey/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where wallet state and report exports live
    pub paths: PathsConfig,
    /// How the external scanning tool is invoked
    pub tool: ToolConfig,
    /// Job and progress estimation settings
    pub jobs: JobsConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `VIEWKEY_WALLETS_DIR`: Override the wallets directory
    /// - `VIEWKEY_EXPORTS_DIR`: Override the exports directory
    /// - `VIEWKEY_TOOL_PROGRAM`: Override the tool program path
    /// - `VIEWKEY_SERVER`: Override the lightwalletd server label
    /// - `VIEWKEY_MIN_BIRTHDAY`: Set the minimum accepted birthday height
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("VIEWKEY_WALLETS_DIR") {
            tracing::debug!("Override paths.wallets_dir from env: {}", val);
            self.paths.wallets_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("VIEWKEY_EXPORTS_DIR") {
            tracing::debug!("Override paths.exports_dir from env: {}", val);
            self.paths.exports_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("VIEWKEY_TOOL_PROGRAM") {
            tracing::debug!("Override tool.program from env: {}", val);
            self.tool.program = val;
        }

        if let Some(val) = lookup("VIEWKEY_SERVER") {
            tracing::debug!("Override tool.server from env: {}", val);
            self.tool.server = val;
        }

        if let Some(val) = lookup("VIEWKEY_MIN_BIRTHDAY") {
            match val.parse() {
                Ok(height) => {
                    self.jobs.min_birthday_height = Some(height);
                    tracing::debug!("Override jobs.min_birthday_height from env: {}", height);
                }
                Err(_) => tracing::warn!("Ignoring non-numeric VIEWKEY_MIN_BIRTHDAY: {}", val),
            }
        }
    }

    /// Check values that would make the progress estimator misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        let jobs = &self.jobs;
        if jobs.progress_ceiling >= 100 {
            return Err(ConfigError::InvalidValue {
                field: "jobs.progress_ceiling".to_string(),
                reason: "must be below 100".to_string(),
            });
        }
        if jobs.parsing_progress >= 100 {
            return Err(ConfigError::InvalidValue {
                field: "jobs.parsing_progress".to_string(),
                reason: "must be below 100".to_string(),
            });
        }
        if jobs.progress_step == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs.progress_step".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if jobs.progress_tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs.progress_tick_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/viewkey/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = project_dirs().ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("me", "zcash", "viewkey")
}

fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("."),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

/// Locations of per-key wallet state and exported reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Parent directory of the per-slug wallet directories
    pub wallets_dir: PathBuf,
    /// Directory the tool writes transaction reports into
    pub exports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            wallets_dir: data_dir.join("wallets"),
            exports_dir: data_dir.join("exports"),
        }
    }
}

impl PathsConfig {
    /// Wallet directory for a slug: `<wallets_dir>/<slug>`.
    #[must_use]
    pub fn wallet_dir(&self, slug: &WalletSlug) -> PathBuf {
        self.wallets_dir.join(slug.as_str())
    }

    /// Output prefix for a slug: `<exports_dir>/<slug>_txs`.
    #[must_use]
    pub fn output_prefix(&self, slug: &WalletSlug) -> PathBuf {
        self.exports_dir.join(format!("{slug}_txs"))
    }

    /// Create the wallets and exports directories if they do not exist.
    pub fn ensure_directories(&self) -> ConfigResult<()> {
        fs::create_dir_all(&self.wallets_dir)?;
        fs::create_dir_all(&self.exports_dir)?;
        Ok(())
    }
}

/// Which invoker drives the external scanning tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    /// Run a helper program that takes `--key`, `--birthday`, `--wallet-dir`,
    /// `--name` and `--output-prefix`
    Script,
    /// Drive `zcash-devtool` directly (init, sync, enhance, list-tx)
    Devtool,
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Invocation style
    pub mode: ToolMode,
    /// Program to run: the helper script interpreter or the devtool binary
    pub program: String,
    /// Leading arguments, e.g. the helper script path or `run --release --`
    pub program_args: Vec<String>,
    /// Working directory for the tool, if it needs one
    pub working_dir: Option<PathBuf>,
    /// Lightwalletd server label passed to the tool
    pub server: String,
    /// Pass `--disable-tor` to devtool commands that accept it
    pub disable_tor: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            mode: ToolMode::Devtool,
            program: "zcash-devtool".to_string(),
            program_args: Vec::new(),
            working_dir: None,
            server: "zecrocks".to_string(),
            disable_tor: true,
        }
    }
}

/// Job and progress estimation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Wallet label used when a request does not name one
    pub default_wallet_name: String,
    /// Reject birthdays below this height (unset = accept any)
    pub min_birthday_height: Option<BirthdayHeight>,
    /// Interval between progress bumps in milliseconds
    pub progress_tick_ms: u64,
    /// First progress value the estimator reports
    pub progress_start: u8,
    /// Amount added per tick
    pub progress_step: u8,
    /// The estimator stops before reaching this value
    pub progress_ceiling: u8,
    /// Progress shown while the report is parsed
    pub parsing_progress: u8,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_wallet_name: "webwallet".to_string(),
            min_birthday_height: None,
            progress_tick_ms: 2000,
            progress_start: 5,
            progress_step: 3,
            progress_ceiling: 80,
            parsing_progress: 90,
        }
    }
}

impl JobsConfig {
    /// Progress tick as a `Duration`.
    #[must_use]
    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }
}
