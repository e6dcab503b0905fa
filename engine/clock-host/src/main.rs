//! Clock Host
//!
//! Drives the clock engine from a fixed-rate frame loop until interrupted or until a
//! frame limit is reached, then prints a per-clock report.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use clock_engine::{ClockRegistry, TracingSink};
use clock_host::{demo, initialize_logging, load_configuration, setup_signal_handlers, FrameDriver};

#[derive(Parser)]
#[command(name = "clock-host")]
#[command(about = "Frame-loop host for the clock engine")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Override the configured frame rate in Hz
    #[arg(long)]
    frame_rate: Option<f64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(rate) = cli.frame_rate {
        config.frame_rate_hz = rate;
        clock_host::config::validate_config(&config)?;
    }

    initialize_logging(&config.logging)?;
    info!("Starting Clock Host v{}", env!("CARGO_PKG_VERSION"));

    let mut registry = ClockRegistry::new(config.engine.clone()).context("Failed to build clock registry")?;
    registry.subscribe(TracingSink);
    let demo = demo::install(&mut registry).context("Failed to install demo workload")?;
    info!(clocks = registry.len(), "Clock registry ready");

    let shutdown = setup_signal_handlers()?;
    info!("Signal handlers configured");

    let mut driver = FrameDriver::new(
        registry,
        Duration::from_secs_f64(config.frame_period_secs()),
        Duration::from_secs_f64(config.stall_threshold_secs),
    );
    driver.run(&shutdown, cli.frames).await?;

    let report = driver.report();
    info!(frames = report.frames, stalls = report.stalls, simulation_steps = demo.steps(), "Frame loop stopped");
    println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize run report")?);

    info!("Clock Host shutdown complete");
    Ok(())
}
