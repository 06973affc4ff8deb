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

//! I/O port bus contract
//!
//! The I/O bus owns the machine's devices. The system needs four things
//! from it:
//! - device lookup by identifier (plugins attach to devices by name)
//! - port writes on behalf of [`System::write`](crate::core::system::System::write)
//! - a stream of read/write accesses to forward to observers
//! - `init()`/`reset()` during boot
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 PortIoBus                    │
//! ├──────────────────────────────────────────────┤
//! │  devices: [Rc<dyn IoDevice>]   (by name)     │
//! │  ports:   port -> Rc<dyn PortHandler>        │
//! │  access observers                            │
//! └──────────────────────────────────────────────┘
//!        ▲ lookup                 ▲ read/write
//!        │                        │
//!   plugin loader             CPU IN/OUT
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::deferred::Deferred;
use super::error::{EmulatorError, Result};
use super::event::{Event, EventEmitter};
use super::plugin::PluginData;

/// A single port access seen on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoAccess {
    Read { port: u16, length: u8 },
    Write { port: u16, value: u32, length: u8 },
}

impl Event for IoAccess {
    // Access observers see every access
    type Kind = ();

    fn kind(&self) {}
}

/// Access observer installed on the bus
pub type AccessObserver = Box<dyn Fn(&IoAccess)>;

/// A device registered on the I/O bus
pub trait IoDevice {
    /// Name plugins use to find this device (e.g. "NE2K", "VGA")
    fn identifier(&self) -> &str;

    /// Hooks this device exposes to plugins
    fn plugin_data(&self) -> PluginData;

    fn init(&self) -> Deferred {
        Deferred::done()
    }

    fn reset(&self) {}
}

/// The system's view of the I/O bus
pub trait IoBus {
    /// Write `value` to `port` as a `length`-byte access
    fn write(&self, port: u16, value: u32, length: u8);

    /// Find a registered device by identifier
    fn registered_device(&self, identifier: &str) -> Option<Rc<dyn IoDevice>>;

    /// Subscribe to port reads and writes
    fn observe(&self, observer: AccessObserver);

    fn init(&self) -> Deferred;

    fn reset(&self);
}

/// Register-level port access for a device
pub trait PortHandler {
    fn read(&self, port: u16, length: u8) -> u32;

    fn write(&self, port: u16, value: u32, length: u8);
}

/// Mask selecting the low `length` bytes of an access
fn access_mask(length: u8) -> u32 {
    match length {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => 0xFFFF_FFFF,
    }
}

/// Reference I/O bus with exact-port routing
///
/// # Example
///
/// ```
/// use pcsys::core::io::{IoBus, PortIoBus};
///
/// let bus = PortIoBus::new();
/// // Nothing decodes port 0x80: reads float high
/// assert_eq!(bus.read(0x80, 1), 0xFF);
/// assert!(bus.registered_device("VGA").is_none());
/// ```
pub struct PortIoBus {
    devices: RefCell<Vec<Rc<dyn IoDevice>>>,
    ports: RefCell<HashMap<u16, Rc<dyn PortHandler>>>,
    accesses: EventEmitter<IoAccess>,
}

impl PortIoBus {
    pub fn new() -> Self {
        Self {
            devices: RefCell::new(Vec::new()),
            ports: RefCell::new(HashMap::new()),
            accesses: EventEmitter::new(),
        }
    }

    /// Register a device under its identifier
    pub fn register_device(&self, device: Rc<dyn IoDevice>) -> Result<()> {
        let mut devices = self.devices.borrow_mut();
        if devices
            .iter()
            .any(|existing| existing.identifier() == device.identifier())
        {
            return Err(EmulatorError::Device {
                device: "PortIoBus",
                reason: format!(
                    "device identifier '{}' registered twice",
                    device.identifier()
                ),
            });
        }
        log::debug!("PortIoBus: registered device '{}'", device.identifier());
        devices.push(device);
        Ok(())
    }

    /// Route `len` ports starting at `start` to `handler`
    ///
    /// Ports wrap at 0xFFFF like the x86 port space.
    pub fn map_ports(&self, start: u16, len: u16, handler: Rc<dyn PortHandler>) {
        let mut ports = self.ports.borrow_mut();
        for offset in 0..len {
            ports.insert(start.wrapping_add(offset), Rc::clone(&handler));
        }
    }

    /// Read `length` bytes from `port`
    pub fn read(&self, port: u16, length: u8) -> u32 {
        self.accesses.emit(IoAccess::Read { port, length });

        let handler = self.ports.borrow().get(&port).cloned();
        match handler {
            Some(handler) => handler.read(port, length) & access_mask(length),
            None => {
                log::trace!("PortIoBus: read from unmapped port 0x{:04X}", port);
                access_mask(length)
            }
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.borrow().len()
    }
}

impl Default for PortIoBus {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBus for PortIoBus {
    fn write(&self, port: u16, value: u32, length: u8) {
        let value = value & access_mask(length);
        self.accesses.emit(IoAccess::Write {
            port,
            value,
            length,
        });

        let handler = self.ports.borrow().get(&port).cloned();
        match handler {
            Some(handler) => handler.write(port, value, length),
            None => log::trace!(
                "PortIoBus: write 0x{:X} to unmapped port 0x{:04X}",
                value,
                port
            ),
        }
    }

    fn registered_device(&self, identifier: &str) -> Option<Rc<dyn IoDevice>> {
        self.devices
            .borrow()
            .iter()
            .find(|device| device.identifier() == identifier)
            .cloned()
    }

    fn observe(&self, observer: AccessObserver) {
        self.accesses.on((), move |access: &IoAccess| observer(access));
    }

    fn init(&self) -> Deferred {
        // Devices come up one at a time, in registration order
        let devices: Vec<_> = self.devices.borrow().clone();

        Deferred::pending(async move {
            for device in devices {
                device.init().await?;
                log::debug!("PortIoBus: device '{}' initialized", device.identifier());
            }
            Ok(())
        })
    }

    fn reset(&self) {
        let devices: Vec<_> = self.devices.borrow().clone();
        for device in devices {
            device.reset();
        }
    }
}
