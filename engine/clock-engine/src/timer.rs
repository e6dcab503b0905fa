//! Deferred one-shot and repeating invocations layered on clock passes.

use serde::{Deserialize, Serialize};

use crate::clock::TICK_EPSILON;
use crate::error::ClockError;
use crate::types::{Callback, Context, TimerId};

/// How many times a timer fires before it is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repetition {
    Count(u32),
    Infinite,
}

impl Repetition {
    pub const ONCE: Repetition = Repetition::Count(1);

    pub fn validate(&self) -> Result<(), ClockError> {
        match self {
            Repetition::Count(0) => Err(ClockError::InvalidRepetition),
            _ => Ok(()),
        }
    }
}

pub(crate) struct Timer {
    pub(crate) id: TimerId,
    pub(crate) interval: f64,
    pub(crate) remaining: Repetition,
    pub(crate) accumulated: f64,
    pub(crate) callback: Option<Callback>,
    pub(crate) context: Option<Context>,
}

impl Timer {
    /// Consumes one firing; true when this was the last one
    fn consume(&mut self) -> bool {
        match &mut self.remaining {
            Repetition::Infinite => false,
            Repetition::Count(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        }
    }
}

/// Outcome of asking a timer for its next firing
pub(crate) enum Firing {
    /// Not enough accumulated time
    Idle,
    /// Fire once; `last` means the timer must be removed after the call
    Fire { interval: f64, last: bool },
}

/// Timers scoped to one clock or to the global pool, in insertion order
#[derive(Default)]
pub struct TimerPool {
    timers: Vec<Timer>,
}

impl TimerPool {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub(crate) fn insert(
        &mut self,
        id: TimerId,
        interval: f64,
        repetition: Repetition,
        callback: Callback,
        context: Option<Context>,
    ) {
        self.timers.push(Timer {
            id,
            interval,
            remaining: repetition,
            accumulated: 0.0,
            callback: Some(callback),
            context,
        });
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(pos) => {
                self.timers.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    /// Remaining firings, `None` when the timer is gone
    pub fn remaining(&self, id: TimerId) -> Option<Repetition> {
        self.get(id).map(|t| t.remaining)
    }

    /// Point-in-time list of timer ids in insertion order
    pub fn ids(&self) -> Vec<TimerId> {
        self.timers.iter().map(|t| t.id).collect()
    }

    pub fn clear(&mut self) -> Vec<TimerId> {
        self.timers.drain(..).map(|t| t.id).collect()
    }

    /// Adds `dt` to the timer's accumulator. False if the timer is gone.
    pub(crate) fn accumulate(&mut self, id: TimerId, dt: f64) -> bool {
        match self.get_mut(id) {
            Some(timer) => {
                timer.accumulated += dt;
                true
            }
            None => false,
        }
    }

    /// Consumes one interval from the accumulator if a firing is due
    pub(crate) fn next_firing(&mut self, id: TimerId) -> Option<Firing> {
        let timer = self.get_mut(id)?;
        if timer.accumulated + TICK_EPSILON < timer.interval {
            return Some(Firing::Idle);
        }
        timer.accumulated = (timer.accumulated - timer.interval).max(0.0);
        let last = timer.consume();
        Some(Firing::Fire { interval: timer.interval, last })
    }

    /// Discards whole intervals left over once the per-evaluation cap is hit.
    /// Returns the number of firings dropped.
    pub(crate) fn discard_backlog(&mut self, id: TimerId) -> u64 {
        let Some(timer) = self.get_mut(id) else {
            return 0;
        };
        if timer.accumulated + TICK_EPSILON < timer.interval {
            return 0;
        }
        let dropped = ((timer.accumulated + TICK_EPSILON) / timer.interval).floor();
        timer.accumulated = (timer.accumulated - dropped * timer.interval).max(0.0);
        dropped as u64
    }

    pub(crate) fn checkout(&mut self, id: TimerId) -> Option<(Callback, Option<Context>)> {
        let timer = self.get_mut(id)?;
        let callback = timer.callback.take()?;
        Some((callback, timer.context.clone()))
    }

    pub(crate) fn checkin(&mut self, id: TimerId, callback: Callback) -> bool {
        match self.get_mut(id) {
            Some(timer) => {
                timer.callback = Some(callback);
                true
            }
            None => false,
        }
    }

    fn get(&self, id: TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback {
        Box::new(|_, _, _| {})
    }

    fn fire_count(pool: &mut TimerPool, id: TimerId) -> (u32, bool) {
        let mut fired = 0;
        loop {
            match pool.next_firing(id) {
                Some(Firing::Fire { last, .. }) => {
                    fired += 1;
                    if last {
                        return (fired, true);
                    }
                }
                _ => return (fired, false),
            }
        }
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(Repetition::Count(0).validate().is_err());
        assert!(Repetition::ONCE.validate().is_ok());
        assert!(Repetition::Infinite.validate().is_ok());
    }

    #[test]
    fn one_shot_reports_last_firing() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(1), 1.0, Repetition::ONCE, noop(), None);
        assert!(pool.accumulate(TimerId(1), 1.0));
        assert_eq!(fire_count(&mut pool, TimerId(1)), (1, true));
    }

    #[test]
    fn repeating_timer_fires_per_whole_interval() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(1), 0.5, Repetition::Infinite, noop(), None);
        pool.accumulate(TimerId(1), 1.25);
        assert_eq!(fire_count(&mut pool, TimerId(1)), (2, false));
        pool.accumulate(TimerId(1), 0.25);
        assert_eq!(fire_count(&mut pool, TimerId(1)), (1, false));
        assert_eq!(pool.remaining(TimerId(1)), Some(Repetition::Infinite));
    }

    #[test]
    fn finite_count_decrements() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(3), 0.1, Repetition::Count(3), noop(), None);
        pool.accumulate(TimerId(3), 0.1);
        assert_eq!(fire_count(&mut pool, TimerId(3)), (1, false));
        assert_eq!(pool.remaining(TimerId(3)), Some(Repetition::Count(2)));
    }

    #[test]
    fn discard_backlog_keeps_fraction() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(1), 0.5, Repetition::Infinite, noop(), None);
        pool.accumulate(TimerId(1), 2.2);
        assert_eq!(pool.discard_backlog(TimerId(1)), 4);
        assert!(matches!(pool.next_firing(TimerId(1)), Some(Firing::Idle)));
    }

    #[test]
    fn tenths_summing_to_interval_fire() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(1), 1.0, Repetition::ONCE, noop(), None);
        for _ in 0..10 {
            pool.accumulate(TimerId(1), 0.1);
        }
        assert_eq!(fire_count(&mut pool, TimerId(1)), (1, true));
    }

    #[test]
    fn discard_backlog_counts_near_whole_intervals() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(1), 0.1, Repetition::Infinite, noop(), None);
        for _ in 0..3 {
            pool.accumulate(TimerId(1), 0.1);
        }
        assert_eq!(pool.discard_backlog(TimerId(1)), 3);
        assert!(matches!(pool.next_firing(TimerId(1)), Some(Firing::Idle)));
    }

    #[test]
    fn removal_is_idempotent() {
        let mut pool = TimerPool::new();
        pool.insert(TimerId(1), 1.0, Repetition::Infinite, noop(), None);
        assert!(pool.remove(TimerId(1)));
        assert!(!pool.remove(TimerId(1)));
        assert!(pool.is_empty());
    }
}
