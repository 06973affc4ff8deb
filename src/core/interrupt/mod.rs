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

//! Interrupt controller contract
//!
//! The PC routes 16 IRQ lines through a pair of cascaded 8259A PICs.
//! Devices raise and lower lines through the system; the controller
//! prioritizes them and drives the CPU's INTR pin. When the CPU accepts
//! the interrupt it runs an acknowledge cycle and receives the vector.
//!
//! ## Handshake
//!
//! ```text
//! device ──raise_irq(n)──▶ PIC ──INTR──▶ CPU
//!                           ▲            │
//!                           └── INTA ────┘  acknowledge_interrupt() -> vector
//! ```
//!
//! ## Line Assignment (ISA)
//!
//! ```text
//! IRQ | Device
//! ----|---------------------------
//! 0   | PIT channel 0
//! 1   | Keyboard
//! 2   | Cascade from slave PIC
//! 3-4 | Serial ports
//! 6   | Floppy controller
//! 8   | RTC
//! 12  | PS/2 mouse
//! 14  | Primary IDE
//! 15  | Secondary IDE
//! ```

use std::fmt;

/// Number of IRQ lines on the cascaded PIC pair
pub const IRQ_LINES: usize = 16;

/// A validated IRQ line number (0-15)
///
/// # Example
///
/// ```
/// use pcsys::core::interrupt::Irq;
///
/// assert_eq!(Irq::new(14).unwrap().line(), 14);
/// assert!(Irq::new(16).is_none());
/// assert!(Irq::new(-1).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Irq(u8);

impl Irq {
    /// `None` outside 0-15
    pub fn new(irq: i32) -> Option<Self> {
        u8::try_from(irq)
            .ok()
            .filter(|&line| usize::from(line) < IRQ_LINES)
            .map(Self)
    }

    pub fn line(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Irq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IRQ{}", self.0)
    }
}

/// The system's view of the interrupt controller
///
/// Arbitration and masking are the controller's business; the system only
/// forwards line changes and acknowledge cycles.
pub trait InterruptController {
    /// Run an acknowledge cycle and return the vector of the highest
    /// priority pending interrupt
    fn acknowledge_interrupt(&self) -> u8;

    fn raise_irq(&self, irq: u8);

    fn lower_irq(&self, irq: u8);
}
