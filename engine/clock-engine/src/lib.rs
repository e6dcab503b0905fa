//! # ClockEngine
//!
//! Independently paced logical clocks that drive per-frame simulation updates.
//!
//! A [`ClockRegistry`] owns every [`Clock`]. The host calls [`ClockRegistry::update`] once per
//! frame with the measured real elapsed time; each clock turns that time into zero or more
//! dispatch passes, invoking its registered callbacks in priority order and then evaluating the
//! timers scoped to it. One reference clock (named [`CORE_CLOCK_NAME`]) always exists: it paces
//! the global timers and anchors resynchronisation.

pub mod arena;
pub mod binding;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod info;
pub mod metrics;
pub mod modifier;
pub mod registry;
pub mod timer;
pub mod types;



pub use clock::Clock;
pub use config::{ClockConfig, EngineConfig, ModifierConfig};
pub use error::{ClockError, ErrorKind};
pub use events::{ClockEvent, ClockEventKind, EventLog, EventSink, TracingSink};
pub use info::ClockInfo;
pub use metrics::ClockStats;
pub use modifier::{Modifier, ModifierKind, MAX_AVERAGE_WINDOW};
pub use registry::ClockRegistry;
pub use timer::Repetition;
pub use types::{
    BindingId, Callback, ClockId, Context, Priority, TickMode, TimerHandle, TimerId, TimerScope,
};

/// Current version of the ClockEngine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the reference clock created with every registry
pub const CORE_CLOCK_NAME: &str = "core";

/// Default cap on catch-up ticks (and timer firings) per update call
pub const DEFAULT_MAX_CATCH_UP: u32 = 8;
