//! Clock Host Library
//!
//! Runs a [`clock_engine::ClockRegistry`] from a real-time frame loop: configuration
//! loading, logging setup, signal handling and the frame driver itself.

use std::path::Path;

use anyhow::{Context, Result};

pub mod config;
pub mod demo;
pub mod driver;
pub mod logging;
pub mod signals;

pub use config::{HostConfig, LoggingConfig};
pub use driver::{FrameDriver, RunReport};
pub use logging::initialize_logging;
pub use signals::{setup_signal_handlers, ShutdownSignal};

/// Load configuration from an optional file and environment variables
pub fn load_configuration(path: Option<&Path>) -> Result<HostConfig> {
    config::load_config(path).context("Failed to load host configuration")
}
