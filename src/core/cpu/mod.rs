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

//! CPU core contract
//!
//! The system never steps instructions itself. It boots the core, resets
//! it, hands it the execution loop and drives its INTR pin; everything else
//! (fetch, decode, execute) belongs to the core implementation.
//!
//! ## Pins and events
//!
//! ```text
//!            ┌──────────────┐
//!  INTR ───▶ │   CPU core   │ ───▶ interrupt(vector) observers
//!            └──────────────┘
//! ```

use super::deferred::Deferred;
use super::error::Result;

/// x86 register file snapshot
///
/// General-purpose registers are ordered by their encoding:
/// EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI.
/// Segment registers likewise: ES, CS, SS, DS, FS, GS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuRegisters {
    pub general: [u32; 8],
    pub segments: [u16; 6],
    pub eip: u32,
    pub eflags: u32,
}

impl CpuRegisters {
    pub const EAX: usize = 0;
    pub const ECX: usize = 1;
    pub const EDX: usize = 2;
    pub const EBX: usize = 3;
    pub const ESP: usize = 4;
    pub const EBP: usize = 5;
    pub const ESI: usize = 6;
    pub const EDI: usize = 7;

    pub const CS: usize = 1;

    /// Real-mode linear address of the next instruction (CS:IP)
    pub fn linear_ip(&self) -> u32 {
        ((self.segments[Self::CS] as u32) << 4).wrapping_add(self.eip & 0xFFFF)
    }
}

/// Interrupt observer installed by the system (receives the vector)
pub type InterruptObserver = Box<dyn FnMut(u8)>;

/// A CPU core the system can boot and drive
///
/// Pins are shared hardware: devices raise INTR through the system while
/// the core may be in the middle of `run()`, so every method takes `&self`
/// and implementations keep their own interior mutability.
pub trait CpuCore {
    /// Current register file
    fn registers(&self) -> CpuRegisters;

    /// Bring the core online (may complete later)
    fn init(&self) -> Deferred;

    /// Reset to the power-on state
    fn reset(&self);

    /// Enter the execution loop
    fn run(&self) -> Result<()>;

    /// Stop executing at the next instruction boundary
    fn halt(&self);

    /// Assert the INTR pin
    fn raise_intr(&self);

    /// Deassert the INTR pin
    fn lower_intr(&self);

    /// Subscribe to interrupts taken by the core
    fn observe_interrupts(&self, observer: InterruptObserver);
}
