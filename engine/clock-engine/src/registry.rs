//! The clock registry: creation, lookup, lifecycle and the per-frame update.

use std::collections::HashMap;
use std::fmt;

use crate::arena::Arena;
use crate::clock::{validate_tick_size, Clock};
use crate::config::{ClockConfig, EngineConfig};
use crate::error::ClockError;
use crate::events::{ClockEvent, ClockEventKind, EventPublisher, EventSink};
use crate::info::ClockInfo;
use crate::metrics::ClockStats;
use crate::modifier::{Modifier, ModifierKind};
use crate::timer::{Firing, Repetition, TimerPool};
use crate::types::{
    BindingId, Callback, ClockId, Context, Priority, TickMode, TimerHandle, TimerId, TimerScope,
};
use crate::{CORE_CLOCK_NAME, DEFAULT_MAX_CATCH_UP};

/// Result of trying to fire a timer once
enum TimerStep {
    Fired,
    Expired,
    Idle,
}

/// Directory of every clock, plus the global timer pool paced by the reference clock.
///
/// All callbacks receive `&mut ClockRegistry`, so they can mutate bindings, timers and clock
/// state from inside their own invocation. Only [`ClockRegistry::update`] and
/// [`ClockRegistry::delete`] are refused while an update is running.
pub struct ClockRegistry {
    clocks: Arena<Clock>,
    names: HashMap<String, ClockId>,
    core: ClockId,

    global_timers: TimerPool,
    events: EventPublisher,

    max_catch_up: u32,
    updating: bool,
    time: f64,

    next_binding: u64,
    next_timer: u64,
}

impl Default for ClockRegistry {
    fn default() -> Self {
        Self::with_core(TickMode::Variable, 0.0, DEFAULT_MAX_CATCH_UP)
    }
}

impl fmt::Debug for ClockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockRegistry")
            .field("clocks", &self.clocks.len())
            .field("core", &self.core)
            .field("global_timers", &self.global_timers.len())
            .field("max_catch_up", &self.max_catch_up)
            .field("updating", &self.updating)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl ClockRegistry {
    /// Create a registry with its reference clock and every configured clock
    pub fn new(config: EngineConfig) -> Result<Self, ClockError> {
        config.validate()?;

        let (mode, tick_size) = config.core_tick();
        let mut registry = Self::with_core(mode, tick_size, config.max_catch_up);
        for clock in &config.clocks {
            registry.create_from_config(clock)?;
        }

        tracing::info!(
            clocks = registry.len(),
            max_catch_up = registry.max_catch_up,
            "Created ClockRegistry"
        );
        Ok(registry)
    }

    fn with_core(mode: TickMode, tick_size: f64, max_catch_up: u32) -> Self {
        let mut clocks = Arena::new();
        let core = clocks.insert_with(|id| Clock::new(id, CORE_CLOCK_NAME, mode, tick_size));
        let mut names = HashMap::new();
        names.insert(CORE_CLOCK_NAME.to_string(), core);

        Self {
            clocks,
            names,
            core,
            global_timers: TimerPool::new(),
            events: EventPublisher::new(),
            max_catch_up,
            updating: false,
            time: 0.0,
            next_binding: 1,
            next_timer: 1,
        }
    }

    /// Add a receiver for RESTART, RESYNC, PAUSE and UNPAUSE events
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.events.subscribe(Box::new(sink));
    }

    /// Number of live clocks, the reference clock included
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// The reference clock
    #[inline]
    pub fn core(&self) -> ClockId {
        self.core
    }

    /// Total real time fed to [`ClockRegistry::update`]
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn max_catch_up(&self) -> u32 {
        self.max_catch_up
    }

    #[inline]
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Create a named clock. Fixed-step clocks need a strictly positive tick size.
    pub fn create(&mut self, name: &str, tick_size: f64, mode: TickMode) -> Result<ClockId, ClockError> {
        if mode == TickMode::Fixed {
            validate_tick_size(tick_size)?;
        }
        if self.names.contains_key(name) {
            return Err(ClockError::ClockAlreadyExists { name: name.to_string() });
        }

        let id = self.clocks.insert_with(|id| Clock::new(id, name, mode, tick_size));
        self.names.insert(name.to_string(), id);

        tracing::info!(clock = name, id = %id, ?mode, tick_size, "Created clock");
        Ok(id)
    }

    /// Create a clock from an already parsed configuration entry
    pub fn create_from_config(&mut self, config: &ClockConfig) -> Result<ClockId, ClockError> {
        config.validate()?;
        let modifier = config.modifier.map(|m| m.to_modifier()).transpose()?;

        let (mode, tick_size) = config.tick();
        let id = self.create(&config.name, tick_size, mode)?;
        if let Some(modifier) = modifier {
            self.clock_entry(id)?.set_modifier(modifier);
        }
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Result<ClockId, ClockError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ClockError::ClockNotFound { name: name.to_string() })
    }

    /// Enumerate clocks in slot order. `None` starts from the beginning.
    pub fn get_next(&self, previous: Option<ClockId>) -> Option<ClockId> {
        self.clocks.next_after(previous)
    }

    /// Live clocks in enumeration order
    pub fn ids(&self) -> Vec<ClockId> {
        self.clocks.ids()
    }

    /// First clock with the given mode and, when `tick_size` is set, that tick size
    pub fn find_first(&self, tick_size: Option<f64>, mode: TickMode) -> Option<ClockId> {
        self.find_from(None, tick_size, mode)
    }

    /// Next clock after `previous` sharing its mode and tick size
    pub fn find_next(&self, previous: ClockId) -> Option<ClockId> {
        let clock = self.clocks.get(previous)?;
        self.find_from(Some(previous), Some(clock.tick_size()), clock.mode())
    }

    fn find_from(&self, mut cursor: Option<ClockId>, tick_size: Option<f64>, mode: TickMode) -> Option<ClockId> {
        while let Some(id) = self.clocks.next_after(cursor) {
            let clock = self.clocks.get(id)?;
            if clock.mode() == mode && tick_size.map_or(true, |size| clock.tick_size() == size) {
                return Some(id);
            }
            cursor = Some(id);
        }
        None
    }

    /// Remove a clock along with all of its bindings and timers
    pub fn delete(&mut self, clock: ClockId) -> Result<(), ClockError> {
        if self.updating {
            return Err(ClockError::UpdateLocked);
        }
        if clock == self.core {
            return Err(ClockError::ReferenceClockProtected);
        }

        let entry = self.clock_entry(clock)?;
        for binding in entry.bindings.clear() {
            tracing::debug!(clock = %clock, binding = %binding, "Unregistered binding of deleted clock");
        }
        for timer in entry.timers.clear() {
            tracing::debug!(clock = %clock, timer = %timer, "Removed timer of deleted clock");
        }

        if let Some(removed) = self.clocks.remove(clock) {
            self.names.remove(removed.name());
            tracing::info!(clock = removed.name(), id = %clock, "Deleted clock");
        }
        Ok(())
    }

    pub fn clock(&self, clock: ClockId) -> Result<&Clock, ClockError> {
        self.clocks.get(clock).ok_or(ClockError::UnknownClock(clock))
    }

    pub fn name(&self, clock: ClockId) -> Result<&str, ClockError> {
        self.clock(clock).map(Clock::name)
    }

    /// Clock a dispatch snapshot was taken from, if it still exists
    pub fn clock_from_info(&self, info: &ClockInfo) -> Option<ClockId> {
        self.clocks.contains(info.clock).then_some(info.clock)
    }

    /// Register a callback on `clock`. Among equal priorities, the first registered runs first.
    pub fn register<F>(
        &mut self,
        clock: ClockId,
        callback: F,
        context: Option<Context>,
        priority: Priority,
    ) -> Result<BindingId, ClockError>
    where
        F: FnMut(&mut ClockRegistry, &ClockInfo, Option<&Context>) + 'static,
    {
        let id = BindingId(self.next_binding);
        self.clock_entry(clock)?.bindings.insert(id, priority, Box::new(callback), context);
        self.next_binding += 1;

        tracing::debug!(clock = %clock, binding = %id, ?priority, "Registered binding");
        Ok(id)
    }

    /// Remove a binding. Safe to call from any callback, including the binding's own.
    pub fn unregister(&mut self, clock: ClockId, binding: BindingId) -> Result<(), ClockError> {
        if self.clock_entry(clock)?.bindings.remove(binding).is_some() {
            tracing::debug!(clock = %clock, binding = %binding, "Unregistered binding");
            return Ok(());
        }

        let issued = binding.0 < self.next_binding;
        let live_elsewhere = self.clocks.iter().any(|(_, c)| c.bindings.contains(binding));
        if issued && !live_elsewhere {
            tracing::debug!(clock = %clock, binding = %binding, "Binding already unregistered");
            Err(ClockError::BindingAlreadyRemoved(binding))
        } else {
            Err(ClockError::BindingNotFound(binding))
        }
    }

    /// Priority of a live binding; `None` when it is not registered on `clock`
    pub fn priority_of(&self, clock: ClockId, binding: BindingId) -> Option<Priority> {
        self.clocks.get(clock)?.bindings.priority_of(binding)
    }

    pub fn context(&self, clock: ClockId, binding: BindingId) -> Result<Option<Context>, ClockError> {
        self.clock(clock)?
            .bindings
            .context(binding)
            .ok_or(ClockError::BindingNotFound(binding))
    }

    pub fn set_context(
        &mut self,
        clock: ClockId,
        binding: BindingId,
        context: Option<Context>,
    ) -> Result<(), ClockError> {
        if self.clock_entry(clock)?.bindings.set_context(binding, context) {
            Ok(())
        } else {
            Err(ClockError::BindingNotFound(binding))
        }
    }

    pub fn binding_count(&self, clock: ClockId) -> Result<usize, ClockError> {
        self.clock(clock).map(Clock::binding_count)
    }

    pub fn set_modifier(&mut self, clock: ClockId, kind: ModifierKind, value: f64) -> Result<(), ClockError> {
        let modifier = Modifier::new(kind, value)?;
        self.clock_entry(clock)?.set_modifier(modifier);
        tracing::debug!(clock = %clock, ?kind, value = modifier.value, "Set modifier");
        Ok(())
    }

    pub fn modifier(&self, clock: ClockId) -> Result<Modifier, ClockError> {
        self.clock(clock).map(Clock::modifier)
    }

    pub fn set_tick_size(&mut self, clock: ClockId, size: f64) -> Result<(), ClockError> {
        self.clock_entry(clock)?.set_tick_size(size)
    }

    /// Stop dispatch and timers on `clock`. Publishes PAUSE on the transition only.
    pub fn pause(&mut self, clock: ClockId) -> Result<(), ClockError> {
        if self.clock_entry(clock)?.pause() {
            tracing::debug!(clock = %clock, "Paused clock");
            self.publish(ClockEventKind::Pause, clock);
        }
        Ok(())
    }

    /// Resume `clock`. Time received while paused is never caught up.
    pub fn unpause(&mut self, clock: ClockId) -> Result<(), ClockError> {
        if self.clock_entry(clock)?.unpause() {
            tracing::debug!(clock = %clock, "Unpaused clock");
            self.publish(ClockEventKind::Unpause, clock);
        }
        Ok(())
    }

    pub fn is_paused(&self, clock: ClockId) -> Result<bool, ClockError> {
        self.clock(clock).map(Clock::is_paused)
    }

    /// Reset elapsed time and pending tick time to zero; pause state is kept
    pub fn restart(&mut self, clock: ClockId) -> Result<(), ClockError> {
        self.clock_entry(clock)?.restart();
        tracing::debug!(clock = %clock, "Restarted clock");
        self.publish(ClockEventKind::Restart, clock);
        Ok(())
    }

    /// Realign `clock` on the reference time without dispatching
    pub fn resync(&mut self, clock: ClockId) -> Result<(), ClockError> {
        let now = self.time;
        self.clock_entry(clock)?.resync(now);
        tracing::debug!(clock = %clock, at = now, "Resynced clock");
        self.publish(ClockEventKind::Resync, clock);
        Ok(())
    }

    /// Resync every clock, the reference clock included
    pub fn resync_all(&mut self) {
        let ids = self.clocks.ids();
        tracing::debug!(clocks = ids.len(), at = self.time, "Resyncing all clocks");
        for id in ids {
            if let Err(err) = self.resync(id) {
                tracing::warn!(clock = %id, error = %err, "Failed to resync clock");
            }
        }
    }

    /// Snapshot of the clock's most recent pass
    pub fn info(&self, clock: ClockId) -> Result<ClockInfo, ClockError> {
        self.clock(clock).map(Clock::info)
    }

    pub fn stats(&self, clock: ClockId) -> Result<ClockStats, ClockError> {
        self.clock(clock).map(Clock::stats)
    }

    /// Add a timer paced by `clock`'s dispatch passes
    pub fn add_timer<F>(
        &mut self,
        clock: ClockId,
        callback: F,
        interval: f64,
        repetition: Repetition,
        context: Option<Context>,
    ) -> Result<TimerHandle, ClockError>
    where
        F: FnMut(&mut ClockRegistry, &ClockInfo, Option<&Context>) + 'static,
    {
        self.insert_timer(TimerScope::Clock(clock), Box::new(callback), interval, repetition, context)
    }

    /// Add a timer paced by the reference clock
    pub fn add_global_timer<F>(
        &mut self,
        callback: F,
        interval: f64,
        repetition: Repetition,
        context: Option<Context>,
    ) -> Result<TimerHandle, ClockError>
    where
        F: FnMut(&mut ClockRegistry, &ClockInfo, Option<&Context>) + 'static,
    {
        self.insert_timer(TimerScope::Global, Box::new(callback), interval, repetition, context)
    }

    fn insert_timer(
        &mut self,
        scope: TimerScope,
        callback: Callback,
        interval: f64,
        repetition: Repetition,
        context: Option<Context>,
    ) -> Result<TimerHandle, ClockError> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(ClockError::InvalidInterval { value: interval });
        }
        repetition.validate()?;

        let id = TimerId(self.next_timer);
        let pool = match scope {
            TimerScope::Clock(clock) => &mut self.clock_entry(clock)?.timers,
            TimerScope::Global => &mut self.global_timers,
        };
        pool.insert(id, interval, repetition, callback, context);
        self.next_timer += 1;

        tracing::debug!(timer = %id, ?scope, interval, ?repetition, "Added timer");
        Ok(TimerHandle { id, scope })
    }

    /// Remove a timer from whichever scope it lives in
    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<(), ClockError> {
        let TimerHandle { id, scope } = handle;
        let removed = match self.timer_pool_mut(scope) {
            Some(pool) => pool.remove(id),
            // Timers go with their clock
            None => false,
        };
        if removed {
            tracing::debug!(timer = %id, ?scope, "Removed timer");
            return Ok(());
        }

        if id.0 < self.next_timer {
            tracing::debug!(timer = %id, ?scope, "Timer already removed or expired");
            Err(ClockError::TimerAlreadyRemoved(id))
        } else {
            Err(ClockError::TimerNotFound(id))
        }
    }

    pub fn remove_global_timer(&mut self, timer: TimerId) -> Result<(), ClockError> {
        self.remove_timer(TimerHandle { id: timer, scope: TimerScope::Global })
    }

    /// Live timers in `scope`
    pub fn timer_count(&self, scope: TimerScope) -> Result<usize, ClockError> {
        match scope {
            TimerScope::Clock(clock) => self.clock(clock).map(Clock::timer_count),
            TimerScope::Global => Ok(self.global_timers.len()),
        }
    }

    /// Remaining firings of a live timer
    pub fn timer_remaining(&self, handle: TimerHandle) -> Option<Repetition> {
        self.timer_pool(handle.scope)?.remaining(handle.id)
    }

    /// Advance every clock by `real_dt` seconds of measured real time.
    ///
    /// Clocks are updated in enumeration order. Clocks created by a callback during this
    /// call are first updated on the next call.
    pub fn update(&mut self, real_dt: f64) -> Result<(), ClockError> {
        if self.updating {
            return Err(ClockError::UpdateLocked);
        }
        if !(real_dt.is_finite() && real_dt >= 0.0) {
            return Err(ClockError::InvalidElapsedTime { value: real_dt });
        }

        self.updating = true;
        self.time += real_dt;
        for id in self.clocks.ids() {
            self.update_clock(id, real_dt);
        }
        self.updating = false;
        Ok(())
    }

    fn update_clock(&mut self, id: ClockId, real_dt: f64) {
        let max_catch_up = self.max_catch_up;
        let Some(clock) = self.clocks.get_mut(id) else {
            return;
        };
        if clock.is_paused() {
            tracing::trace!(clock = clock.name(), "Skipping paused clock");
            return;
        }

        let plan = clock.plan(real_dt, max_catch_up);
        if plan.dropped > 0 {
            tracing::warn!(
                clock = clock.name(),
                dropped = plan.dropped,
                max_catch_up,
                "Catch-up cap reached, dropping ticks"
            );
        }

        // Timers added during this update start accumulating on a later pass
        let globals = (id == self.core).then(|| self.global_timers.ids());
        let mut dispatched = 0.0;
        for dt in plan.passes {
            // A callback may pause its own clock mid-update
            let (info, timers) = match self.clocks.get_mut(id) {
                Some(clock) if !clock.is_paused() => (clock.begin_pass(dt), clock.timers.ids()),
                _ => break,
            };
            self.dispatch(id, &info);
            self.evaluate_timers(TimerScope::Clock(id), timers, dt);
            dispatched += dt;
        }

        if let Some(globals) = globals {
            if dispatched > 0.0 {
                self.evaluate_timers(TimerScope::Global, globals, dispatched);
            }
        }
    }

    /// Invoke every binding registered when the pass starts, highest priority first.
    /// Bindings removed mid-pass are skipped; bindings added mid-pass wait for the next one.
    fn dispatch(&mut self, id: ClockId, info: &ClockInfo) {
        let order = match self.clocks.get(id) {
            Some(clock) => clock.bindings.dispatch_order(),
            None => return,
        };
        tracing::trace!(clock = %id, bindings = order.len(), dt = info.dt, time = info.time, "Dispatch pass");

        for binding in order {
            let Some((mut callback, context)) =
                self.clocks.get_mut(id).and_then(|clock| clock.bindings.checkout(binding))
            else {
                continue;
            };

            callback(self, info, context.as_ref());

            let kept = match self.clocks.get_mut(id) {
                Some(clock) => clock.bindings.checkin(binding, callback),
                None => false,
            };
            if !kept {
                tracing::trace!(clock = %id, binding = %binding, "Binding removed during dispatch");
            }
        }
    }

    /// Feed `dt` to the `timers` of `scope` that still exist and fire what is due, at most
    /// `max_catch_up` times per timer. Backlog past the cap is discarded.
    fn evaluate_timers(&mut self, scope: TimerScope, timers: Vec<TimerId>, dt: f64) {
        for timer in timers {
            let accumulated = self.timer_pool_mut(scope).map_or(false, |pool| pool.accumulate(timer, dt));
            if !accumulated {
                continue;
            }

            let mut fired = 0;
            while fired < self.max_catch_up {
                match self.fire_timer(scope, timer) {
                    TimerStep::Fired => fired += 1,
                    TimerStep::Expired | TimerStep::Idle => break,
                }
            }

            if fired == self.max_catch_up {
                let dropped = self.timer_pool_mut(scope).map_or(0, |pool| pool.discard_backlog(timer));
                if dropped > 0 {
                    tracing::warn!(timer = %timer, ?scope, dropped, "Timer catch-up cap reached, dropping firings");
                    if let Some(stats) = self.scope_stats(scope) {
                        stats.record_dropped_timer_fires(dropped);
                    }
                }
            }
        }
    }

    fn fire_timer(&mut self, scope: TimerScope, timer: TimerId) -> TimerStep {
        let clock = match scope {
            TimerScope::Clock(clock) => clock,
            TimerScope::Global => self.core,
        };
        let Some(info) = self.clocks.get(clock).map(Clock::info) else {
            return TimerStep::Idle;
        };
        let Some(pool) = self.timer_pool_mut(scope) else {
            return TimerStep::Idle;
        };

        let (interval, last) = match pool.next_firing(timer) {
            Some(Firing::Fire { interval, last }) => (interval, last),
            Some(Firing::Idle) | None => return TimerStep::Idle,
        };
        let Some((mut callback, context)) = pool.checkout(timer) else {
            return TimerStep::Idle;
        };

        callback(self, &info.with_dt(interval), context.as_ref());
        if let Some(stats) = self.scope_stats(scope) {
            stats.record_timer_fire();
        }

        let Some(pool) = self.timer_pool_mut(scope) else {
            return TimerStep::Expired;
        };
        if last {
            pool.remove(timer);
            tracing::debug!(timer = %timer, ?scope, "Timer expired");
            return TimerStep::Expired;
        }
        if pool.checkin(timer, callback) {
            TimerStep::Fired
        } else {
            TimerStep::Expired
        }
    }

    fn clock_entry(&mut self, clock: ClockId) -> Result<&mut Clock, ClockError> {
        self.clocks.get_mut(clock).ok_or(ClockError::UnknownClock(clock))
    }

    fn timer_pool(&self, scope: TimerScope) -> Option<&TimerPool> {
        match scope {
            TimerScope::Clock(clock) => self.clocks.get(clock).map(|c| &c.timers),
            TimerScope::Global => Some(&self.global_timers),
        }
    }

    fn timer_pool_mut(&mut self, scope: TimerScope) -> Option<&mut TimerPool> {
        match scope {
            TimerScope::Clock(clock) => self.clocks.get_mut(clock).map(|c| &mut c.timers),
            TimerScope::Global => Some(&mut self.global_timers),
        }
    }

    /// Stats of the clock pacing `scope`
    fn scope_stats(&mut self, scope: TimerScope) -> Option<&mut ClockStats> {
        let clock = match scope {
            TimerScope::Clock(clock) => clock,
            TimerScope::Global => self.core,
        };
        self.clocks.get_mut(clock).map(Clock::stats_mut)
    }

    fn publish(&mut self, kind: ClockEventKind, clock: ClockId) {
        let Some(name) = self.clocks.get(clock).map(|c| c.name().to_string()) else {
            return;
        };
        self.events.publish(ClockEvent { kind, clock, name });
    }
}
