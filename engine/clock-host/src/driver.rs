//! The host update loop: measures real frame time and feeds it to the clock registry.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use clock_engine::{ClockError, ClockRegistry, ClockStats};

use crate::signals::ShutdownSignal;

/// Per-clock line of the exit report
#[derive(Debug, Clone, Serialize)]
pub struct ClockReport {
    pub name: String,
    pub time: f64,
    pub paused: bool,
    pub stats: ClockStats,
}

/// Summary of a driver run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub frames: u64,
    pub stalls: u64,
    pub time: f64,
    pub clocks: Vec<ClockReport>,
}

/// Owns the registry and advances it once per host frame
pub struct FrameDriver {
    registry: ClockRegistry,
    frame_period: Duration,
    stall_threshold: Duration,
    last_frame: Option<Instant>,
    frames: u64,
    stalls: u64,
}

impl FrameDriver {
    pub fn new(registry: ClockRegistry, frame_period: Duration, stall_threshold: Duration) -> Self {
        Self { registry, frame_period, stall_threshold, last_frame: None, frames: 0, stalls: 0 }
    }

    pub fn registry(&self) -> &ClockRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ClockRegistry {
        &mut self.registry
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    /// Advance every clock by one frame of `elapsed` real time.
    ///
    /// A frame longer than the stall threshold resyncs all clocks and is fed as one
    /// nominal frame period instead.
    pub fn step(&mut self, elapsed: Duration) -> Result<(), ClockError> {
        let dt = if elapsed > self.stall_threshold {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.stall_threshold.as_millis() as u64,
                "Host stall detected, resyncing clocks"
            );
            self.registry.resync_all();
            self.stalls += 1;
            self.frame_period
        } else {
            elapsed
        };

        self.registry.update(dt.as_secs_f64())?;
        self.frames += 1;
        Ok(())
    }

    /// Measure the time since the previous frame and step by it
    pub fn tick(&mut self) -> Result<(), ClockError> {
        let now = Instant::now();
        let elapsed = self.last_frame.map_or(Duration::ZERO, |last| now.duration_since(last));
        self.last_frame = Some(now);
        self.step(elapsed)
    }

    /// Run frames at the configured rate until `shutdown` triggers or `max_frames` are done
    pub async fn run(&mut self, shutdown: &ShutdownSignal, max_frames: Option<u64>) -> Result<()> {
        let mut interval = tokio::time::interval(self.frame_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(frame_period_ms = self.frame_period.as_secs_f64() * 1000.0, ?max_frames, "Starting frame loop");
        self.last_frame = Some(Instant::now());

        loop {
            interval.tick().await;

            if shutdown.is_triggered() {
                info!(frames = self.frames, "Shutdown requested, leaving frame loop");
                break;
            }

            self.tick().with_context(|| format!("Frame {} failed", self.frames))?;

            if max_frames.is_some_and(|max| self.frames >= max) {
                info!(frames = self.frames, "Frame limit reached");
                break;
            }
        }

        Ok(())
    }

    pub fn report(&self) -> RunReport {
        let clocks = self
            .registry
            .ids()
            .into_iter()
            .filter_map(|id| self.registry.clock(id).ok())
            .map(|clock| ClockReport {
                name: clock.name().to_string(),
                time: clock.time(),
                paused: clock.is_paused(),
                stats: clock.stats(),
            })
            .collect();

        RunReport { frames: self.frames, stalls: self.stalls, time: self.registry.time(), clocks }
    }
}
