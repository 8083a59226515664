//! Config file discovery, loading, and environment variable overlay.

use std::env;
use std::path::{Path, PathBuf};

use crate::{ConfigError, RtProfConfig};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations, optionally with a CLI
/// override path.
///
/// Returns paths in load order (system, user, local). Only returns files
/// that exist. If `cli_path` is provided and exists, it replaces the local
/// override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/rtprof/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("rtprof/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("rtprof.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a config file into a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deserialize a merged table; missing keys fall back to defaults.
pub fn into_config(table: toml::Table, origin: &Path) -> Result<RtProfConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base` key by key; nested tables merge recursively.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `RTPROF_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut RtProfConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Values that fail to parse are ignored and not recorded as overrides.
pub fn apply_overrides_from<F>(config: &mut RtProfConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(
        lookup: &dyn Fn(&str) -> Option<String>,
        key: &str,
    ) -> Option<T> {
        lookup(key).and_then(|v| v.trim().parse().ok())
    }

    let lookup: &dyn Fn(&str) -> Option<String> = &lookup;

    if let Some(v) = lookup("RTPROF_ENABLED").and_then(|v| parse_bool(&v)) {
        config.profiling.enabled = v;
        sources.env_overrides.push("RTPROF_ENABLED".to_string());
    }
    if let Some(v) = parsed(lookup, "RTPROF_DURATION_MS") {
        config.profiling.duration_ms = v;
        sources.env_overrides.push("RTPROF_DURATION_MS".to_string());
    }
    if let Some(v) = parsed(lookup, "RTPROF_N_PROF") {
        config.profiling.n_prof = v;
        sources.env_overrides.push("RTPROF_N_PROF".to_string());
    }
    if let Some(v) = parsed(lookup, "RTPROF_PRINT_MODE") {
        config.profiling.print_mode = v;
        sources.env_overrides.push("RTPROF_PRINT_MODE".to_string());
    }
    if let Some(v) = parsed(lookup, "RTPROF_POLL_INTERVAL_MS") {
        config.profiling.poll_interval_ms = v;
        sources.env_overrides.push("RTPROF_POLL_INTERVAL_MS".to_string());
    }

    if let Some(v) = parsed(lookup, "RTPROF_SAMPLE_RATE") {
        config.render.sample_rate = v;
        sources.env_overrides.push("RTPROF_SAMPLE_RATE".to_string());
    }
    if let Some(v) = parsed(lookup, "RTPROF_BLOCK_SIZE") {
        config.render.block_size = v;
        sources.env_overrides.push("RTPROF_BLOCK_SIZE".to_string());
    }
    if let Some(v) = parsed(lookup, "RTPROF_VOICES") {
        config.render.voices = v;
        sources.env_overrides.push("RTPROF_VOICES".to_string());
    }

    if let Some(v) = lookup("RTPROF_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RTPROF_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
