use serde::Serialize;

use crate::modifier::Modifier;
use crate::types::{ClockId, TickMode};

/// Snapshot handed to every callback invoked during one dispatch pass.
///
/// Built fresh for each pass; callbacks only ever see it by reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockInfo {
    #[serde(skip)]
    pub clock: ClockId,
    pub mode: TickMode,
    /// Delta for this pass, in seconds
    pub dt: f64,
    /// Tick size in seconds, 0 for variable-step clocks
    pub tick_size: f64,
    /// Total dispatched time since the last restart, in seconds
    pub time: f64,
    pub modifier: Modifier,
}

impl ClockInfo {
    pub(crate) fn idle(clock: ClockId, mode: TickMode, tick_size: f64) -> Self {
        Self { clock, mode, dt: 0.0, tick_size, time: 0.0, modifier: Modifier::NONE }
    }

    /// Same snapshot with a different delta, used for timer invocations
    pub(crate) fn with_dt(&self, dt: f64) -> Self {
        Self { dt, ..*self }
    }
}
