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

//! Physical memory contracts
//!
//! The system writes guest memory on behalf of loaders and front ends
//! through [`MemoryBus`], and places ROM images through [`RomLoader`].
//! The storage engine behind them is not the system's concern;
//! [`PhysicalMemory`] is a flat reference implementation used by the
//! boot-check binary and tests.
//!
//! ## PC Memory Map (first megabyte)
//!
//! ```text
//! 0x00000 - 0x9FFFF   Conventional RAM
//! 0xA0000 - 0xBFFFF   VGA framebuffer
//! 0xC0000 - 0xC7FFF   VGA BIOS
//! 0xF0000 - 0xFFFFF   System BIOS
//! ```

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use super::error::{EmulatorError, Result};

/// Byte-addressed physical memory writes
pub trait MemoryBus {
    fn write_byte(&self, address: u32, value: u8);

    fn write_block(&self, address: u32, data: &[u8]);
}

/// Kinds of ROM image the loader understands
///
/// # Example
///
/// ```
/// use pcsys::core::memory::RomType;
///
/// let rom: RomType = "cmos".parse().unwrap();
/// assert_eq!(rom.code(), 0);
/// assert!("floppy".parse::<RomType>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomType {
    /// CMOS/system BIOS image
    Cmos,
}

impl RomType {
    /// Numeric type code expected by the ROM loader
    pub fn code(self) -> u8 {
        match self {
            Self::Cmos => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cmos => "cmos",
        }
    }
}

impl FromStr for RomType {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cmos" => Ok(Self::Cmos),
            other => Err(EmulatorError::UnknownRomType(other.to_string())),
        }
    }
}

impl fmt::Display for RomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Places ROM images in the physical address space
pub trait RomLoader {
    fn load_rom(&self, buffer: &[u8], address: u32, type_code: u8) -> Result<()>;
}

/// Flat RAM covering `0..size`
///
/// Out-of-range writes are dropped with a warning, as on an ISA bus with
/// nothing decoding the address.
///
/// # Example
///
/// ```
/// use pcsys::core::memory::{MemoryBus, PhysicalMemory};
///
/// let ram = PhysicalMemory::new(0x1000);
/// ram.write_byte(0x10, 0xAA);
/// ram.write_block(0x20, &[1, 2, 3]);
/// assert_eq!(ram.read_byte(0x10), 0xAA);
/// assert_eq!(ram.read_block(0x20, 3), vec![1, 2, 3]);
/// ```
pub struct PhysicalMemory {
    data: RefCell<Vec<u8>>,
}

impl PhysicalMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: RefCell::new(vec![0; size]),
        }
    }

    pub fn size(&self) -> usize {
        self.data.borrow().len()
    }

    /// Read a byte; unmapped addresses read as open bus (0xFF)
    pub fn read_byte(&self, address: u32) -> u8 {
        self.data
            .borrow()
            .get(address as usize)
            .copied()
            .unwrap_or(0xFF)
    }

    pub fn read_block(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|offset| self.read_byte(address.wrapping_add(offset as u32)))
            .collect()
    }

    fn store(&self, address: u32, bytes: &[u8]) -> bool {
        let mut data = self.data.borrow_mut();
        let start = address as usize;
        let end = match start.checked_add(bytes.len()) {
            Some(end) if end <= data.len() => end,
            _ => {
                log::warn!(
                    "PhysicalMemory: {}-byte write at 0x{:08X} exceeds {} bytes of RAM",
                    bytes.len(),
                    address,
                    data.len()
                );
                return false;
            }
        };
        data[start..end].copy_from_slice(bytes);
        true
    }
}

impl MemoryBus for PhysicalMemory {
    fn write_byte(&self, address: u32, value: u8) {
        self.store(address, &[value]);
    }

    fn write_block(&self, address: u32, data: &[u8]) {
        self.store(address, data);
    }
}

impl RomLoader for PhysicalMemory {
    fn load_rom(&self, buffer: &[u8], address: u32, type_code: u8) -> Result<()> {
        if !self.store(address, buffer) {
            return Err(EmulatorError::Device {
                device: "PhysicalMemory",
                reason: format!(
                    "ROM image of {} bytes does not fit at 0x{:08X}",
                    buffer.len(),
                    address
                ),
            });
        }
        log::info!(
            "Loaded {} byte ROM (type {}) at 0x{:08X}",
            buffer.len(),
            type_code,
            address
        );
        Ok(())
    }
}
