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

/// Emulator error types
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Main error type for the emulator
///
/// Every message names the operation that failed and the offending value.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("System::load_plugin(): unrecognised standard plugin identifier '{0}'")]
    UnknownPlugin(String),

    #[error("System::init(): no I/O device registered with identifier '{identifier}'")]
    MissingIoDevice { identifier: String },

    #[error("System::{operation}(): invalid IRQ number {irq} (must be between 0-15 inclusive)")]
    InvalidIrq { operation: &'static str, irq: i32 },

    #[error("System::register_irq(): IRQ {irq} conflict for '{handler}' (already in use by '{owner}')")]
    IrqConflict {
        irq: u8,
        handler: String,
        owner: String,
    },

    #[error("System::write(): '{0}' not specified")]
    MissingWriteOption(&'static str),

    #[error("System::write(): only one of 'to' (0x{to:08X}) or 'port' (0x{port:04X}) may be specified")]
    ConflictingWriteTarget { to: u32, port: u16 },

    #[error("System::write(): {kind} data cannot be written to {target}")]
    InvalidWriteData {
        kind: &'static str,
        target: &'static str,
    },

    #[error("System::{0}(): not yet initialized")]
    NotInitialized(&'static str),

    #[error("System::init(): already {0}")]
    AlreadyInitialized(&'static str),

    #[error("System::{operation}(): no {collaborator} attached")]
    MissingCollaborator {
        operation: &'static str,
        collaborator: &'static str,
    },

    #[error("System::load_rom(): unrecognised ROM type '{0}'")]
    UnknownRomType(String),

    #[error("Plugin '{plugin}' error: {reason}")]
    Plugin { plugin: String, reason: String },

    #[error("{device} error: {reason}")]
    Device {
        device: &'static str,
        reason: String,
    },

    #[error("Invalid machine configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Machine configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl EmulatorError {
    /// Whether this error is a configuration error
    ///
    /// Configuration errors are raised synchronously at the point where a
    /// bad identifier, IRQ number or option is first seen.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownPlugin(_)
                | Self::MissingIoDevice { .. }
                | Self::InvalidIrq { .. }
                | Self::IrqConflict { .. }
                | Self::MissingWriteOption(_)
                | Self::ConflictingWriteTarget { .. }
                | Self::InvalidWriteData { .. }
                | Self::UnknownRomType(_)
                | Self::InvalidConfig(_)
                | Self::ConfigParse(_)
        )
    }

    /// Whether this error reports an operation attempted in the wrong lifecycle state
    pub fn is_state(&self) -> bool {
        matches!(self, Self::NotInitialized(_) | Self::AlreadyInitialized(_))
    }
}
