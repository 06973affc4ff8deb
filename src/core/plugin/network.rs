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

//! Network adapter plugins
//!
//! The NE2000 adapter hands plugins a [`NetworkHooks`] value. A plugin
//! installs a transmit handler to decide where outgoing frames go, and
//! delivers incoming frames back through the same hooks.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use super::{downcast_plugin_data, Plugin, PluginData, SetupMap};
use crate::core::deferred::Deferred;
use crate::core::io::IoDevice;

/// I/O bus identifier of the network adapter
pub const NETWORK_DEVICE: &str = "NE2K";

/// Handler for frames the guest transmits
pub type FrameHandler = Box<dyn FnMut(&[u8])>;

/// Plugin-facing side of the network adapter
#[derive(Default)]
pub struct NetworkHooks {
    transmit_handler: RefCell<Option<FrameHandler>>,
    received: RefCell<VecDeque<Vec<u8>>>,
    transmitted: Cell<u64>,
}

impl NetworkHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the transmit handler, replacing any previous one
    pub fn on_transmit<F>(&self, handler: F)
    where
        F: FnMut(&[u8]) + 'static,
    {
        *self.transmit_handler.borrow_mut() = Some(Box::new(handler));
    }

    pub fn has_transmit_handler(&self) -> bool {
        self.transmit_handler.borrow().is_some()
    }

    /// Hand a guest frame to the transmit handler
    ///
    /// Returns false when no plugin has claimed the adapter.
    pub fn transmit(&self, frame: &[u8]) -> bool {
        let handler = self.transmit_handler.borrow_mut().take();
        let Some(mut handler) = handler else {
            log::trace!("NE2K: no transmit handler, {} byte frame lost", frame.len());
            return false;
        };

        self.transmitted.set(self.transmitted.get() + 1);
        handler(frame);

        let mut slot = self.transmit_handler.borrow_mut();
        if slot.is_none() {
            *slot = Some(handler);
        }
        true
    }

    /// Queue a frame for the guest to receive
    pub fn deliver(&self, frame: Vec<u8>) {
        self.received.borrow_mut().push_back(frame);
    }

    /// Next frame waiting for the guest
    pub fn take_received(&self) -> Option<Vec<u8>> {
        self.received.borrow_mut().pop_front()
    }

    pub fn pending_frames(&self) -> usize {
        self.received.borrow().len()
    }

    pub fn transmitted_count(&self) -> u64 {
        self.transmitted.get()
    }
}

/// Minimal NE2000 adapter registration
///
/// Registers under [`NETWORK_DEVICE`] and exposes its hooks; the register
/// file is left to a full device model.
pub struct NetworkAdapter {
    hooks: Rc<NetworkHooks>,
}

impl NetworkAdapter {
    pub fn new() -> Self {
        Self {
            hooks: Rc::new(NetworkHooks::new()),
        }
    }

    pub fn hooks(&self) -> Rc<NetworkHooks> {
        Rc::clone(&self.hooks)
    }
}

impl Default for NetworkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for NetworkAdapter {
    fn identifier(&self) -> &str {
        NETWORK_DEVICE
    }

    fn plugin_data(&self) -> PluginData {
        self.hooks.clone()
    }

    fn reset(&self) {
        self.hooks.received.borrow_mut().clear();
    }
}

/// Echoes every transmitted frame back to the guest
#[derive(Debug, Default)]
pub struct LoopbackPlugin;

impl Plugin for LoopbackPlugin {
    fn name(&self) -> &str {
        "network.loopback"
    }

    fn setup_io_devices(self: Box<Self>) -> SetupMap {
        SetupMap::new().with(NETWORK_DEVICE, |data| {
            let hooks = match downcast_plugin_data::<NetworkHooks>("network.loopback", data) {
                Ok(hooks) => hooks,
                Err(err) => return Deferred::Ready(Err(err)),
            };

            // Weak: the handler is stored inside the hooks it delivers to
            let target: Weak<NetworkHooks> = Rc::downgrade(&hooks);
            hooks.on_transmit(move |frame| {
                if let Some(hooks) = target.upgrade() {
                    hooks.deliver(frame.to_vec());
                }
            });
            log::info!("network.loopback attached to {}", NETWORK_DEVICE);
            Deferred::done()
        })
    }
}

/// Accepts and drops every transmitted frame
#[derive(Debug, Default)]
pub struct DiscardPlugin;

impl Plugin for DiscardPlugin {
    fn name(&self) -> &str {
        "network.discard"
    }

    fn setup_io_devices(self: Box<Self>) -> SetupMap {
        SetupMap::new().with(NETWORK_DEVICE, |data| {
            let hooks = match downcast_plugin_data::<NetworkHooks>("network.discard", data) {
                Ok(hooks) => hooks,
                Err(err) => return Deferred::Ready(Err(err)),
            };

            hooks.on_transmit(|frame| {
                log::trace!("network.discard: dropped {} byte frame", frame.len());
            });
            log::info!("network.discard attached to {}", NETWORK_DEVICE);
            Deferred::done()
        })
    }
}
