//! Host configuration management

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use clock_engine::EngineConfig;

use crate::logging::LogFormat;

/// Environment variable naming the configuration file when no path is given
pub const CONFIG_ENV: &str = "CLOCK_HOST_CONFIG";

/// Main host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Target frame rate of the update loop in Hz
    pub frame_rate_hz: f64,

    /// Frame gap in seconds past which the host is considered stalled and clocks are resynced
    pub stall_threshold_secs: f64,

    /// Clock registry configuration
    pub engine: EngineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 60.0,
            stall_threshold_secs: 0.25,
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl HostConfig {
    /// Nominal frame duration in seconds
    pub fn frame_period_secs(&self) -> f64 {
        1.0 / self.frame_rate_hz
    }
}

/// Load configuration from a file (explicit path or [`CONFIG_ENV`]) and environment variables
pub fn load_config(path: Option<&Path>) -> Result<HostConfig> {
    let path = path.map(Path::to_path_buf).or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            tracing::debug!("Loading configuration from file: {:?}", path);
            load_from_file(&path)?
        }
        None => HostConfig::default(),
    };

    // Override with environment variables
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path) -> Result<HostConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse configuration file: {:?}", path))
}

/// Apply `CLOCK_HOST_*` overrides read through `lookup`
pub fn apply_env_overrides(
    config: &mut HostConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(level) = lookup("CLOCK_HOST_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = lookup("CLOCK_HOST_LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Some(rate) = lookup("CLOCK_HOST_FRAME_RATE") {
        config.frame_rate_hz = rate
            .parse()
            .with_context(|| format!("Invalid CLOCK_HOST_FRAME_RATE: {}", rate))?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &HostConfig) -> Result<()> {
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.logging.level)),
    }

    LogFormat::parse(&config.logging.format)?;

    if !(config.frame_rate_hz.is_finite() && config.frame_rate_hz > 0.0) {
        return Err(anyhow!("Invalid frame rate: {}", config.frame_rate_hz));
    }

    if !(config.stall_threshold_secs.is_finite() && config.stall_threshold_secs > 0.0) {
        return Err(anyhow!("Invalid stall threshold: {}", config.stall_threshold_secs));
    }

    config.engine.validate().context("Invalid engine configuration")?;

    Ok(())
}

/// Save configuration to a TOML file
pub fn save_config(config: &HostConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write configuration file: {:?}", path))?;
    Ok(())
}
