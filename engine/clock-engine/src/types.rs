use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::info::ClockInfo;
use crate::registry::ClockRegistry;

/// Handle to a clock slot in the registry arena.
///
/// The generation makes handles to deleted clocks stale instead of aliasing a
/// clock created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ClockId {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ClockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Registration handle returned by `ClockRegistry::register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub(crate) u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Where a timer lives: on one clock, or in the global pool paced by the reference clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerScope {
    Clock(ClockId),
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    pub id: TimerId,
    pub scope: TimerScope,
}

/// Dispatch priority. Higher priorities run first within a pass.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Lowest = 0,
    Lower = 1,
    Low = 2,
    Normal = 3,
    High = 4,
    Higher = 5,
    Highest = 6,
}

impl Priority {
    pub const COUNT: usize = 7;

    /// All levels, lowest first
    pub const ALL: [Priority; Priority::COUNT] = [
        Priority::Lowest,
        Priority::Lower,
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Higher,
        Priority::Highest,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickMode {
    /// Accumulates time and dispatches one pass per whole tick
    Fixed,
    /// Dispatches exactly one pass per update with the effective delta
    Variable,
}

/// Opaque per-binding context handed back to the callback on every call
pub type Context = Rc<dyn Any>;

/// Clock and timer callback.
///
/// The registry is passed in so callbacks can mutate bindings, timers and clock state
/// from inside their own invocation.
pub type Callback = Box<dyn FnMut(&mut ClockRegistry, &ClockInfo, Option<&Context>)>;
