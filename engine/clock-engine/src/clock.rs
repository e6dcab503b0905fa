//! Core Clock implementation

use std::fmt;

use crate::binding::BindingTable;
use crate::error::ClockError;
use crate::info::ClockInfo;
use crate::metrics::ClockStats;
use crate::modifier::{DtHistory, Modifier, ModifierKind};
use crate::timer::TimerPool;
use crate::types::{ClockId, TickMode};

/// Slack allowed when comparing accumulated time against a tick size or timer interval,
/// so that deltas summing to a whole step in floating point still produce it.
pub(crate) const TICK_EPSILON: f64 = 1e-9;

/// Passes a clock owes for one update, computed before any callback runs
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TickPlan {
    /// Delta of each dispatch pass, in order
    pub(crate) passes: Vec<f64>,
    /// Whole ticks discarded by the catch-up cap
    pub(crate) dropped: u64,
}

/// A named, independently paced source of dispatch passes.
///
/// Owned by the [`ClockRegistry`](crate::ClockRegistry); callers hold a [`ClockId`] and go
/// through the registry for every mutation.
pub struct Clock {
    id: ClockId,
    name: String,

    // Pacing
    mode: TickMode,
    tick_size: f64,
    accumulator: f64,
    modifier: Modifier,
    history: DtHistory,

    // Time
    time: f64,
    dt: f64,
    synced_at: f64,
    paused: bool,

    pub(crate) bindings: BindingTable,
    pub(crate) timers: TimerPool,

    stats: ClockStats,
}

impl Clock {
    /// Create a clock. `tick_size` must already be validated for fixed-step clocks and is
    /// ignored for variable-step ones.
    pub(crate) fn new(id: ClockId, name: impl Into<String>, mode: TickMode, tick_size: f64) -> Self {
        let tick_size = match mode {
            TickMode::Fixed => tick_size,
            TickMode::Variable => 0.0,
        };

        Self {
            id,
            name: name.into(),
            mode,
            tick_size,
            accumulator: 0.0,
            modifier: Modifier::NONE,
            history: DtHistory::default(),
            time: 0.0,
            dt: 0.0,
            synced_at: 0.0,
            paused: false,
            bindings: BindingTable::new(),
            timers: TimerPool::new(),
            stats: ClockStats::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> ClockId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn mode(&self) -> TickMode {
        self.mode
    }

    /// Tick size in seconds; 0 for variable-step clocks
    #[inline]
    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    /// Effective time received but not yet consumed by a whole tick
    #[inline]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Total dispatched time since the last restart
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// Registry reference time at the last resync.
    ///
    /// Informational only: a resync drops pending tick time and AVERAGE history, and pacing
    /// never reads this value back.
    #[inline]
    pub fn synced_at(&self) -> f64 {
        self.synced_at
    }

    #[inline]
    pub fn stats(&self) -> ClockStats {
        self.stats
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Snapshot of the most recent pass
    pub fn info(&self) -> ClockInfo {
        ClockInfo {
            dt: self.dt,
            time: self.time,
            modifier: self.modifier,
            ..ClockInfo::idle(self.id, self.mode, self.tick_size)
        }
    }

    pub(crate) fn set_modifier(&mut self, modifier: Modifier) {
        if modifier.kind != self.modifier.kind {
            self.history.clear();
        }
        self.modifier = modifier;
    }

    pub(crate) fn set_tick_size(&mut self, size: f64) -> Result<(), ClockError> {
        let size = validate_tick_size(size)?;
        match self.mode {
            TickMode::Fixed => self.tick_size = size,
            TickMode::Variable => {
                tracing::debug!(clock = %self.name, size, "Ignoring tick size on variable-step clock");
            }
        }
        Ok(())
    }

    /// Returns true on an actual Running -> Paused transition
    pub(crate) fn pause(&mut self) -> bool {
        !std::mem::replace(&mut self.paused, true)
    }

    /// Returns true on an actual Paused -> Running transition
    pub(crate) fn unpause(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    pub(crate) fn restart(&mut self) {
        self.time = 0.0;
        self.accumulator = 0.0;
        self.dt = 0.0;
        self.history.clear();
        self.stats.reset();
    }

    /// Realign the time base on the reference time `now`, dropping pending tick time
    pub(crate) fn resync(&mut self, now: f64) {
        self.accumulator = 0.0;
        self.history.clear();
        self.synced_at = now;
    }

    /// Turn measured real time into the passes owed for this update.
    ///
    /// At most `max_catch_up` passes are planned; whole ticks past the cap are dropped
    /// along with their time. A paused clock plans nothing and keeps its state.
    pub(crate) fn plan(&mut self, real_dt: f64, max_catch_up: u32) -> TickPlan {
        if self.paused {
            return TickPlan::default();
        }

        match self.mode {
            TickMode::Variable => {
                let dt = self.modifier.apply(real_dt, &mut self.history);
                TickPlan { passes: vec![dt], dropped: 0 }
            }
            TickMode::Fixed => {
                // A FIXED modifier keeps real-time pacing and only pins the pass delta
                let pass_dt = match self.modifier.kind {
                    ModifierKind::Fixed => {
                        self.accumulator += real_dt;
                        self.modifier.value
                    }
                    _ => {
                        self.accumulator += self.modifier.apply(real_dt, &mut self.history);
                        self.tick_size
                    }
                };

                let mut plan = TickPlan::default();
                while self.accumulator + TICK_EPSILON >= self.tick_size {
                    if plan.passes.len() >= max_catch_up as usize {
                        let dropped = ((self.accumulator + TICK_EPSILON) / self.tick_size).floor();
                        self.accumulator -= dropped * self.tick_size;
                        plan.dropped = dropped as u64;
                        break;
                    }
                    self.accumulator -= self.tick_size;
                    plan.passes.push(pass_dt);
                }
                self.accumulator = self.accumulator.max(0.0);

                if plan.dropped > 0 {
                    self.stats.record_dropped_ticks(plan.dropped);
                }
                plan
            }
        }
    }

    /// Advance time by one pass of `dt` and snapshot it for the callbacks
    pub(crate) fn begin_pass(&mut self, dt: f64) -> ClockInfo {
        self.dt = dt;
        self.time += dt;
        self.stats.record_pass();
        self.info()
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ClockStats {
        &mut self.stats
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("tick_size", &self.tick_size)
            .field("time", &self.time)
            .field("paused", &self.paused)
            .field("modifier", &self.modifier)
            .field("bindings", &self.bindings.len())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn validate_tick_size(size: f64) -> Result<f64, ClockError> {
    if size.is_finite() && size > 0.0 {
        Ok(size)
    } else {
        Err(ClockError::InvalidTickSize { value: size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn id() -> ClockId {
        ClockId { index: 0, generation: 0 }
    }

    fn fixed(tick: f64) -> Clock {
        Clock::new(id(), "test", TickMode::Fixed, tick)
    }

    #[test]
    fn test_fixed_step_consumes_whole_ticks() {
        let mut clock = fixed(0.1);
        let plan = clock.plan(0.25, 8);

        assert_eq!(plan.passes.len(), 2);
        assert!(plan.passes.iter().all(|dt| approx(*dt, 0.1)));
        assert!(approx(clock.accumulator(), 0.05));
        assert_eq!(plan.dropped, 0);
    }

    #[test]
    fn test_accumulator_carries_between_updates() {
        let mut clock = fixed(0.1);
        assert!(clock.plan(0.05, 8).passes.is_empty());
        assert_eq!(clock.plan(0.05, 8).passes.len(), 1);
        assert!(approx(clock.accumulator(), 0.0));
    }

    #[test]
    fn test_catch_up_cap_discards_excess() {
        let mut clock = fixed(0.1);
        let plan = clock.plan(1.23, 4);

        assert_eq!(plan.passes.len(), 4);
        assert_eq!(plan.dropped, 8);
        assert!(approx(clock.accumulator(), 0.03));
        assert_eq!(clock.stats().dropped_ticks, 8);
    }

    #[test]
    fn test_fixed_modifier_pins_pass_delta() {
        let mut clock = fixed(0.1);
        clock.set_modifier(Modifier::new(ModifierKind::Fixed, 0.02).unwrap());

        assert!(clock.plan(0.05, 8).passes.is_empty());

        let plan = clock.plan(0.25, 8);
        assert_eq!(plan.passes.len(), 3);
        assert!(plan.passes.iter().all(|dt| approx(*dt, 0.02)));
        assert!(approx(clock.accumulator(), 0.0));
    }

    #[test]
    fn test_multiply_scales_fed_time() {
        let mut clock = fixed(0.1);
        clock.set_modifier(Modifier::new(ModifierKind::Multiply, 2.0).unwrap());
        assert_eq!(clock.plan(0.1, 8).passes.len(), 2);
    }

    #[test]
    fn test_variable_step_single_pass() {
        let mut clock = Clock::new(id(), "var", TickMode::Variable, -1.0);
        clock.set_modifier(Modifier::new(ModifierKind::Maxed, 0.05).unwrap());

        let plan = clock.plan(0.2, 8);
        assert_eq!(plan.passes, vec![0.05]);
        assert_eq!(clock.tick_size(), 0.0);
    }

    #[test]
    fn test_paused_clock_plans_nothing() {
        let mut clock = fixed(0.1);
        assert!(clock.pause());
        assert!(!clock.pause());
        assert!(clock.plan(1.0, 8).passes.is_empty());
        assert!(approx(clock.accumulator(), 0.0));
        assert!(clock.unpause());
        assert!(!clock.unpause());
    }

    #[test]
    fn test_begin_pass_advances_time() {
        let mut clock = fixed(0.1);
        let info = clock.begin_pass(0.1);
        let info2 = clock.begin_pass(0.1);

        assert!(approx(info.time, 0.1));
        assert!(approx(info2.time, 0.2));
        assert!(approx(info2.dt, 0.1));
        assert_eq!(info2.clock, id());
        assert_eq!(clock.stats().passes, 2);
    }

    #[test]
    fn test_restart_and_resync() {
        let mut clock = fixed(0.1);
        clock.plan(0.35, 8);
        clock.begin_pass(0.1);

        clock.resync(4.0);
        assert!(approx(clock.accumulator(), 0.0));
        assert!(approx(clock.synced_at(), 4.0));
        assert!(approx(clock.time(), 0.1));

        clock.pause();
        clock.restart();
        assert_eq!(clock.time(), 0.0);
        assert_eq!(clock.stats(), ClockStats::default());
        assert!(clock.is_paused());
    }

    #[test]
    fn test_tick_size_validation() {
        assert!(validate_tick_size(0.0).is_err());
        assert!(validate_tick_size(f64::INFINITY).is_err());
        assert!(validate_tick_size(f64::NAN).is_err());

        let mut clock = fixed(0.1);
        assert_eq!(clock.set_tick_size(-0.5), Err(ClockError::InvalidTickSize { value: -0.5 }));
        assert!(clock.set_tick_size(0.5).is_ok());
        assert!(approx(clock.tick_size(), 0.5));
    }
}
