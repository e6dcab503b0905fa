//! Per-clock dispatch counters

use serde::{Deserialize, Serialize};

/// Counters collected by a clock since its last restart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStats {
    /// Dispatch passes performed
    pub passes: u64,

    /// Whole ticks discarded by the catch-up cap
    pub dropped_ticks: u64,

    /// Timer callbacks invoked (scoped timers, plus global ones for the reference clock)
    pub timer_fires: u64,

    /// Timer firings discarded by the catch-up cap
    pub dropped_timer_fires: u64,
}

impl ClockStats {
    pub fn record_pass(&mut self) {
        self.passes += 1;
    }

    pub fn record_dropped_ticks(&mut self, count: u64) {
        self.dropped_ticks += count;
    }

    pub fn record_timer_fire(&mut self) {
        self.timer_fires += 1;
    }

    pub fn record_dropped_timer_fires(&mut self, count: u64) {
        self.dropped_timer_fires += count;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
