//! Event handling.
//!
//! A [Machine](crate::emulator::Machine) reports its state changes to the
//! [EventListeners](EventListener) registered with
//! [add_listener](crate::emulator::Machine::add_listener). Events are delivered synchronously,
//! in the order the changes happen, before the instruction that caused them finishes.
//!
//! A blanket implementation of [EventListener] for all `Fn(&Event)` is provided.

use crate::instruction::Register;
use crate::segments::Handle;

/// Represents an event that occurred while executing a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An instruction wrote a register.
    RegisterChange {
        /// The register which was written.
        register: Register,

        /// The new value of the register.
        data: u32,
    },

    /// A new segment was mapped.
    SegmentMapped {
        handle: Handle,

        /// Size of the segment in words.
        size: u32,
    },

    /// A segment was unmapped and its handle became reusable.
    SegmentUnmapped {
        handle: Handle,
    },

    /// The program jumped, possibly after replacing segment 0.
    ProgramLoaded {
        /// The segment copied into segment 0, or `0` for a plain jump.
        source: Handle,

        /// The new program counter.
        pc: u32,
    },

    /// A byte was written to the output.
    Output {
        byte: u8,
    },
}

/// Trait for consuming events.
pub trait EventListener {
    /// Called whenever a new event has been created.
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F where F: Fn(&Event) {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener) as Box<dyn EventListener>)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, event: Event) {
        for listener in &mut self.listeners {
            listener.event(&event);
        }
    }
}
