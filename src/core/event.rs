// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Publish/subscribe event fan-out
//!
//! Observers subscribe to an event *kind*; emitting an event calls every
//! observer of its kind synchronously, in subscription order, on the
//! caller's thread. An observer may emit further events (a cascaded IRQ, a
//! port write); those are dispatched in full before the outer emission
//! moves on to its next observer.
//!
//! ```text
//! emit(IrqHigh(4))
//!     │
//!     ├── observers[IrqHigh][0](&event)
//!     ├── observers[IrqHigh][1](&event)
//!     └── ...
//! ```
//!
//! # Example
//!
//! ```
//! use pcsys::core::event::{EventEmitter, SystemEvent, SystemEventKind};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let emitter = EventEmitter::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! let counter = Rc::clone(&seen);
//! emitter.on(SystemEventKind::Pause, move |_: &SystemEvent| counter.set(counter.get() + 1));
//!
//! emitter.emit(SystemEvent::Pause);
//! emitter.emit(SystemEvent::AsyncEvents);
//! assert_eq!(seen.get(), 1);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// An event that can be routed by kind
pub trait Event {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

type Observer<E> = Rc<dyn Fn(&E)>;

/// Ordered observer lists keyed by event kind
pub struct EventEmitter<E: Event> {
    observers: RefCell<HashMap<E::Kind, Vec<Observer<E>>>>,
}

impl<E: Event> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            observers: RefCell::new(HashMap::new()),
        }
    }

    /// Subscribe `observer` to events of `kind`
    ///
    /// Observers added while an event is being dispatched see the next
    /// emission, not the current one.
    pub fn on<F>(&self, kind: E::Kind, observer: F)
    where
        F: Fn(&E) + 'static,
    {
        self.observers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::new(observer));
    }

    /// Dispatch `event` to every observer of its kind
    pub fn emit(&self, event: E) {
        let kind = event.kind();
        // Snapshot so observers can subscribe during dispatch
        let observers = match self.observers.borrow().get(&kind) {
            Some(list) => list.clone(),
            None => return,
        };

        for observer in observers {
            observer(&event);
        }
    }

    /// Number of observers subscribed to `kind`
    pub fn observer_count(&self, kind: E::Kind) -> usize {
        self.observers.borrow().get(&kind).map_or(0, Vec::len)
    }
}

impl<E: Event> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Floppy drive type codes as stored in CMOS register 0x10
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub enum FloppyDriveType {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "360K")]
    K360,
    #[serde(rename = "1.2M")]
    M1_2,
    #[serde(rename = "720K")]
    K720,
    #[serde(rename = "1.44M")]
    M1_44,
    #[serde(rename = "2.88M")]
    M2_88,
}

impl FloppyDriveType {
    /// CMOS drive-type code
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::K360 => 1,
            Self::M1_2 => 2,
            Self::K720 => 3,
            Self::M1_44 => 4,
            Self::M2_88 => 5,
        }
    }
}

/// Snapshot of the equipment configuration reported to BIOS-facing devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Equipment {
    pub floppy_drive_type: FloppyDriveType,
    pub supported_floppies: u8,
}

/// Events emitted by the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// CPU took an interrupt with this vector
    Interrupt { vector: u8 },
    /// An I/O port was read
    IoRead { port: u16, length: u8 },
    /// An I/O port was written
    IoWrite { port: u16, value: u32, length: u8 },
    /// An IRQ line was raised
    IrqHigh(u8),
    /// An IRQ line was lowered
    IrqLow(u8),
    /// An asynchronous event pass finished ticking timers
    AsyncEvents,
    /// Emulation was paused
    Pause,
    /// Floppy drive type or count changed
    EquipmentChange(Equipment),
}

/// Subscription keys for [`SystemEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEventKind {
    Interrupt,
    IoRead,
    IoWrite,
    IrqHigh,
    IrqLow,
    AsyncEvents,
    Pause,
    EquipmentChange,
}

impl SystemEventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::IoRead => "io read",
            Self::IoWrite => "io write",
            Self::IrqHigh => "irq high",
            Self::IrqLow => "irq low",
            Self::AsyncEvents => "async events",
            Self::Pause => "pause",
            Self::EquipmentChange => "equipment change",
        }
    }
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Event for SystemEvent {
    type Kind = SystemEventKind;

    fn kind(&self) -> SystemEventKind {
        match self {
            Self::Interrupt { .. } => SystemEventKind::Interrupt,
            Self::IoRead { .. } => SystemEventKind::IoRead,
            Self::IoWrite { .. } => SystemEventKind::IoWrite,
            Self::IrqHigh(_) => SystemEventKind::IrqHigh,
            Self::IrqLow(_) => SystemEventKind::IrqLow,
            Self::AsyncEvents => SystemEventKind::AsyncEvents,
            Self::Pause => SystemEventKind::Pause,
            Self::EquipmentChange(_) => SystemEventKind::EquipmentChange,
        }
    }
}
