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

//! Core system components
//!
//! This module contains the orchestration layer of the emulated PC:
//! - Clock and timers
//! - Signal lines and the event fan-out
//! - Collaborator contracts (CPU core, PIC, DMA controller, memory and I/O buses)
//! - Device plugins and their loading barrier
//! - Machine configuration
//! - System integration

pub mod clock;
pub mod config;
pub mod cpu;
pub mod deferred;
pub mod dma;
pub mod error;
pub mod event;
pub mod interrupt;
pub mod io;
pub mod memory;
pub mod plugin;
pub mod signal;
pub mod system;
pub mod timer;

// Re-export commonly used types
pub use clock::{Clock, HostClock, ManualClock, Ticks};
pub use config::MachineConfig;
pub use cpu::{CpuCore, CpuRegisters};
pub use deferred::Deferred;
pub use error::{EmulatorError, Result};
pub use event::{Equipment, FloppyDriveType, SystemEvent, SystemEventKind};
pub use interrupt::{InterruptController, Irq};
pub use io::{IoBus, IoDevice, PortIoBus};
pub use memory::{MemoryBus, PhysicalMemory, RomLoader, RomType};
pub use plugin::{Plugin, PluginDescriptor, StandardPlugin};
pub use signal::SignalLine;
pub use system::{System, WriteData, WriteRequest};
pub use timer::{Timer, TimerMode};
