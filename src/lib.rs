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

//! PC/x86 system orchestration core
//!
//! This library provides the hub of a PC emulator: it wires a CPU core, an
//! interrupt controller, a DMA controller, memory and I/O buses and a set
//! of timers together, boots them through an asynchronous plugin-loading
//! sequence and fans hardware events out to observers.
//!
//! # Example
//!
//! ```
//! use pcsys::core::clock::ManualClock;
//! use pcsys::core::io::PortIoBus;
//! use pcsys::core::memory::PhysicalMemory;
//! use pcsys::core::system::{System, WriteData, WriteRequest};
//! use std::rc::Rc;
//!
//! let memory = Rc::new(PhysicalMemory::new(0x10_0000));
//! let system = System::new(
//!     Rc::new(ManualClock::default()),
//!     Rc::new(PortIoBus::new()),
//!     memory.clone(),
//! );
//!
//! system
//!     .write(WriteRequest::new().data(WriteData::Bytes(vec![0xF4])).to(0x7C00))
//!     .unwrap();
//! assert_eq!(memory.read_byte(0x7C00), 0xF4);
//! ```

pub mod core;
