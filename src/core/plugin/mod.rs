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

//! Device plugins
//!
//! A plugin attaches host-side behaviour to emulated devices: it names the
//! I/O devices it wants and supplies a setup function for each. During
//! `System::init()` the loader looks every device up on the I/O bus and
//! calls the setup function with that device's plugin data.
//!
//! ```text
//! Plugin ──setup_io_devices()──▶ SetupMap
//!                                  "NE2K" ─▶ fn(plugin data) -> Deferred
//!                                  "VGA"  ─▶ fn(plugin data) -> Deferred
//! ```
//!
//! Plugins are queued either by catalog key ([`StandardPlugin`]) or as a
//! ready-made instance ([`PluginDescriptor::Instance`]).

pub mod loader;
pub mod network;

pub use loader::{load_plugins, LoadBarrier};
pub use network::{DiscardPlugin, LoopbackPlugin, NetworkAdapter, NetworkHooks, NETWORK_DEVICE};

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use super::deferred::Deferred;
use super::error::{EmulatorError, Result};

/// Device-specific hooks handed to plugin setup functions
///
/// Each device decides what it exposes; setup functions downcast to the
/// concrete type they expect (see [`downcast_plugin_data`]).
pub type PluginData = Rc<dyn Any>;

/// Setup function for one device
pub type SetupFn = Box<dyn FnOnce(PluginData) -> Deferred>;

/// Ordered map from I/O device identifier to setup function
#[derive(Default)]
pub struct SetupMap {
    entries: Vec<(String, SetupFn)>,
}

impl SetupMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setup function for `identifier` (builder style)
    pub fn with<F>(mut self, identifier: impl Into<String>, setup: F) -> Self
    where
        F: FnOnce(PluginData) -> Deferred + 'static,
    {
        self.insert(identifier, setup);
        self
    }

    /// Add a setup function for `identifier`
    ///
    /// A later entry for the same identifier replaces the earlier one.
    pub fn insert<F>(&mut self, identifier: impl Into<String>, setup: F)
    where
        F: FnOnce(PluginData) -> Deferred + 'static,
    {
        let identifier = identifier.into();
        self.entries.retain(|(existing, _)| *existing != identifier);
        self.entries.push((identifier, Box::new(setup)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(identifier, _)| identifier.as_str())
    }
}

impl IntoIterator for SetupMap {
    type Item = (String, SetupFn);
    type IntoIter = std::vec::IntoIter<(String, SetupFn)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Debug for SetupMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.identifiers()).finish()
    }
}

/// A device plugin
pub trait Plugin {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Consume the plugin and produce its device setup map
    fn setup_io_devices(self: Box<Self>) -> SetupMap;
}

/// Downcast plugin data to the hook type a plugin expects
pub fn downcast_plugin_data<T: Any>(plugin: &str, data: PluginData) -> Result<Rc<T>> {
    data.downcast::<T>().map_err(|_| EmulatorError::Plugin {
        plugin: plugin.to_string(),
        reason: format!(
            "device plugin data is not {}",
            std::any::type_name::<T>()
        ),
    })
}

/// Plugins known by catalog key
///
/// # Example
///
/// ```
/// use pcsys::core::plugin::StandardPlugin;
///
/// let plugin: StandardPlugin = "network.loopback".parse().unwrap();
/// assert_eq!(plugin, StandardPlugin::NetworkLoopback);
/// assert!("canvas.vga".parse::<StandardPlugin>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardPlugin {
    /// Frames the network adapter transmits are received back
    NetworkLoopback,
    /// Frames the network adapter transmits are dropped
    NetworkDiscard,
}

impl StandardPlugin {
    pub const ALL: [StandardPlugin; 2] = [Self::NetworkLoopback, Self::NetworkDiscard];

    /// Catalog key
    pub fn identifier(self) -> &'static str {
        match self {
            Self::NetworkLoopback => "network.loopback",
            Self::NetworkDiscard => "network.discard",
        }
    }

    /// Construct the plugin this key names
    pub fn instantiate(self) -> Box<dyn Plugin> {
        match self {
            Self::NetworkLoopback => Box::new(LoopbackPlugin),
            Self::NetworkDiscard => Box::new(DiscardPlugin),
        }
    }
}

impl FromStr for StandardPlugin {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|plugin| plugin.identifier() == s)
            .ok_or_else(|| EmulatorError::UnknownPlugin(s.to_string()))
    }
}

impl fmt::Display for StandardPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// A plugin waiting to be loaded by `System::init()`
pub enum PluginDescriptor {
    /// Catalog key, resolved to an instance at load time
    Standard(StandardPlugin),
    /// Plugin constructed by the caller
    Instance(Box<dyn Plugin>),
}

impl PluginDescriptor {
    pub fn name(&self) -> &str {
        match self {
            Self::Standard(plugin) => plugin.identifier(),
            Self::Instance(plugin) => plugin.name(),
        }
    }

    /// Turn the descriptor into a plugin instance
    pub fn resolve(self) -> Box<dyn Plugin> {
        match self {
            Self::Standard(plugin) => plugin.instantiate(),
            Self::Instance(plugin) => plugin,
        }
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(plugin) => f.debug_tuple("Standard").field(plugin).finish(),
            Self::Instance(plugin) => f.debug_tuple("Instance").field(&plugin.name()).finish(),
        }
    }
}
