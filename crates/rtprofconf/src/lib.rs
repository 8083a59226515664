//! Minimal configuration loading for rtprof.
//!
//! Kept dependency-light so both the profiler library and its host binary
//! can import it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rtprofconf::RtProfConfig;
//!
//! let config = RtProfConfig::load().expect("Failed to load config");
//! println!("measure duration: {} ms", config.profiling.duration_ms);
//! println!("sample rate: {} Hz", config.render.sample_rate);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/rtprof/config.toml` (system)
//! 2. `~/.config/rtprof/config.toml` (user)
//! 3. `./rtprof.toml` (local override, replaced by an explicit path)
//! 4. Environment variables (`RTPROF_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [profiling]
//! enabled = true
//! duration_ms = 500
//! n_prof = 1
//! print_mode = 0
//! poll_interval_ms = 100
//!
//! [render]
//! sample_rate = 44100
//! block_size = 64
//! voices = 16
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{ProfilingConfig, RenderConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Complete rtprof configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RtProfConfig {
    pub profiling: ProfilingConfig,
    pub render: RenderConfig,
    pub telemetry: TelemetryConfig,
}

impl RtProfConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./rtprof.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = Self::load_files(&files)?;

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Load and merge the given files in order, without env overrides.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let config = loader::into_config(merged, &origin)?;

        Ok((config, sources))
    }

    /// Reject values the profiler cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.sample_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "render.sample_rate",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.render.block_size == 0 {
            return Err(ConfigError::Invalid {
                field: "render.block_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.profiling.n_prof == 0 {
            return Err(ConfigError::Invalid {
                field: "profiling.n_prof",
                message: "at least one measure is required".to_string(),
            });
        }
        if self.profiling.print_mode > 1 {
            return Err(ConfigError::Invalid {
                field: "profiling.print_mode",
                message: format!("expected 0 or 1, got {}", self.profiling.print_mode),
            });
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# rtprof configuration\n\n");

        output.push_str("[profiling]\n");
        output.push_str(&format!("enabled = {}\n", self.profiling.enabled));
        output.push_str(&format!("duration_ms = {}\n", self.profiling.duration_ms));
        output.push_str(&format!("n_prof = {}\n", self.profiling.n_prof));
        output.push_str(&format!("print_mode = {}\n", self.profiling.print_mode));
        output.push_str(&format!(
            "poll_interval_ms = {}\n",
            self.profiling.poll_interval_ms
        ));

        output.push_str("\n[render]\n");
        output.push_str(&format!("sample_rate = {}\n", self.render.sample_rate));
        output.push_str(&format!("block_size = {}\n", self.render.block_size));
        output.push_str(&format!("voices = {}\n", self.render.voices));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.telemetry.log_level
        ));

        output
    }
}
