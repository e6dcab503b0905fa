//! Demo workload installed by the binary: a heartbeat timer and a fixed-step simulation clock

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, info};

use clock_engine::{
    BindingId, ClockError, ClockId, ClockRegistry, Context, Priority, Repetition, TickMode, TimerHandle,
};

pub const SIMULATION_CLOCK: &str = "simulation";
pub const SIMULATION_TICK: f64 = 1.0 / 50.0;
pub const HEARTBEAT_INTERVAL: f64 = 1.0;

/// Handles to what [`install`] registered
#[derive(Debug, Clone)]
pub struct Demo {
    pub simulation: ClockId,
    pub step: BindingId,
    pub heartbeat: TimerHandle,
    steps: Rc<Cell<u64>>,
}

impl Demo {
    /// Simulation steps run so far
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }
}

/// Register the demo workload, reusing a configured "simulation" clock when present
pub fn install(registry: &mut ClockRegistry) -> Result<Demo, ClockError> {
    let simulation = match registry.get(SIMULATION_CLOCK) {
        Ok(id) => id,
        Err(_) => registry.create(SIMULATION_CLOCK, SIMULATION_TICK, TickMode::Fixed)?,
    };

    let steps = Rc::new(Cell::new(0u64));
    let context: Context = steps.clone();
    let step = registry.register(
        simulation,
        |_, info, ctx| {
            if let Some(steps) = ctx.and_then(|c| c.downcast_ref::<Cell<u64>>()) {
                steps.set(steps.get() + 1);
                debug!(step = steps.get(), dt = info.dt, time = info.time, "Simulation step");
            }
        },
        Some(context),
        Priority::Normal,
    )?;

    let heartbeat = registry.add_global_timer(
        move |reg, info, _| {
            let sim = reg.info(simulation).ok();
            info!(
                time = info.time,
                simulation_time = sim.map(|s| s.time),
                "Heartbeat"
            );
        },
        HEARTBEAT_INTERVAL,
        Repetition::Infinite,
        None,
    )?;

    info!(clock = SIMULATION_CLOCK, tick = registry.clock(simulation)?.tick_size(), "Demo workload installed");
    Ok(Demo { simulation, step, heartbeat, steps })
}
