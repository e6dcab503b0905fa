//! Clock state-transition events and the sinks they are published to.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::types::ClockId;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEventKind {
    Restart = 0,
    Resync = 1,
    Pause = 2,
    Unpause = 3,
}

impl fmt::Display for ClockEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClockEventKind::Restart => "RESTART",
            ClockEventKind::Resync => "RESYNC",
            ClockEventKind::Pause => "PAUSE",
            ClockEventKind::Unpause => "UNPAUSE",
        };
        f.write_str(s)
    }
}

/// Published on the clock that transitioned
#[derive(Debug, Clone, PartialEq)]
pub struct ClockEvent {
    pub kind: ClockEventKind,
    pub clock: ClockId,
    pub name: String,
}

/// Receiver of published clock events
pub trait EventSink {
    fn publish(&mut self, event: &ClockEvent);
}

/// Fans each event out to every subscribed sink, in subscription order
#[derive(Default)]
pub struct EventPublisher {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn publish(&mut self, event: ClockEvent) {
        tracing::trace!(kind = %event.kind, clock = %event.clock, name = %event.name, "Clock event");
        for sink in self.sinks.iter_mut() {
            sink.publish(&event);
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&mut self, event: &ClockEvent) {
        tracing::info!(clock = %event.name, "Clock {} {}", event.clock, event.kind);
    }
}

/// Shared recording sink; clones observe the same log
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Rc<RefCell<Vec<ClockEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClockEvent> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<ClockEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn count(&self, kind: ClockEventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: &ClockEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
