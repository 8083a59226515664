//! Config sections: profiling session defaults, the render host, telemetry.

use serde::{Deserialize, Serialize};

/// Defaults for profiling sessions started from the command shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// When false the host installs the no-op instrument and the shell
    /// refuses to start sessions.
    /// Default: true
    pub enabled: bool,

    /// Duration of one measure in milliseconds of audio time.
    /// Default: 500
    pub duration_ms: u32,

    /// Number of consecutive measures run by one `prof_start`.
    /// Default: 1
    pub n_prof: u16,

    /// 0 prints the cpu load summary, 1 prints the full per-probe table.
    /// Default: 0
    pub print_mode: u8,

    /// Sleep between two status polls on the shell side.
    /// Default: 100
    pub poll_interval_ms: u64,
}

impl ProfilingConfig {
    pub const DEFAULT_DURATION_MS: u32 = 500;
    pub const DEFAULT_N_PROF: u16 = 1;
    pub const DEFAULT_PRINT_MODE: u8 = 0;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: Self::DEFAULT_DURATION_MS,
            n_prof: Self::DEFAULT_N_PROF,
            print_mode: Self::DEFAULT_PRINT_MODE,
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Synthetic render host parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Default: 44100
    pub sample_rate: u32,

    /// Frames per rendered block (one tick per frame).
    /// Default: 64
    pub block_size: u32,

    /// Voices kept sounding by the synthetic renderer.
    /// Default: 16
    pub voices: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 64,
            voices: 16,
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    /// Default: info
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
