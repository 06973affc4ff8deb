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

//! Machine configuration
//!
//! A machine is described by a small TOML file:
//!
//! ```toml
//! plugins = ["network.loopback"]
//!
//! [floppy]
//! drive_type = "1.44M"
//! count = 1
//!
//! [[rom]]
//! path = "bios.bin"
//! address = 0xF0000
//! type = "cmos"
//!
//! [clock]
//! ticks_per_second = 1000000
//! ```
//!
//! Every section is optional. ROM paths are resolved relative to the
//! directory the file was loaded from.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use super::clock::DEFAULT_TICKS_PER_SECOND;
use super::error::{EmulatorError, Result};
use super::event::FloppyDriveType;
use super::memory::RomType;
use super::plugin::StandardPlugin;

/// Most floppy drives a PC BIOS reports in the equipment word
pub const MAX_FLOPPY_DRIVES: u8 = 4;

/// Parsed and validated machine description
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    /// Standard plugin catalog keys, loaded in order
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub floppy: FloppyConfig,
    #[serde(default)]
    pub rom: Vec<RomConfig>,
    #[serde(default)]
    pub clock: ClockConfig,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloppyConfig {
    #[serde(default)]
    pub drive_type: FloppyDriveType,
    #[serde(default)]
    pub count: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RomConfig {
    pub path: PathBuf,
    pub address: u32,
    #[serde(rename = "type", default = "default_rom_type")]
    pub rom_type: String,
}

fn default_rom_type() -> String {
    RomType::Cmos.name().to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u64,
}

fn default_ticks_per_second() -> u64 {
    DEFAULT_TICKS_PER_SECOND
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

/// A ROM image ready to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    pub path: PathBuf,
    pub address: u32,
    pub rom_type: RomType,
}

impl MachineConfig {
    /// Parse and validate a configuration held in memory
    ///
    /// Relative ROM paths resolve against the current directory.
    pub fn parse_str(text: &str) -> Result<Self> {
        let config: MachineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::parse_str(&text)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        log::debug!(
            "Loaded machine config {} ({} plugins, {} ROM images)",
            path.display(),
            config.plugins.len(),
            config.rom.len()
        );
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Replace the directory ROM paths are resolved against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Catalog entries for every configured plugin key
    pub fn standard_plugins(&self) -> Result<Vec<StandardPlugin>> {
        self.plugins
            .iter()
            .map(|key| {
                key.parse::<StandardPlugin>().map_err(|_| {
                    EmulatorError::InvalidConfig(format!("unknown plugin '{}'", key))
                })
            })
            .collect()
    }

    /// ROM images with resolved paths and types
    pub fn rom_images(&self) -> Result<Vec<RomImage>> {
        self.rom
            .iter()
            .map(|rom| {
                let rom_type = RomType::from_str(&rom.rom_type).map_err(|_| {
                    EmulatorError::InvalidConfig(format!(
                        "ROM '{}' has unknown type '{}'",
                        rom.path.display(),
                        rom.rom_type
                    ))
                })?;
                Ok(RomImage {
                    path: self.base_dir.join(&rom.path),
                    address: rom.address,
                    rom_type,
                })
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        self.standard_plugins()?;
        self.rom_images()?;

        if self.floppy.count > MAX_FLOPPY_DRIVES {
            return Err(EmulatorError::InvalidConfig(format!(
                "floppy count {} exceeds {} drives",
                self.floppy.count, MAX_FLOPPY_DRIVES
            )));
        }
        if self.floppy.count > 0 && self.floppy.drive_type == FloppyDriveType::None {
            return Err(EmulatorError::InvalidConfig(format!(
                "{} floppy drive(s) configured without a drive type",
                self.floppy.count
            )));
        }
        if self.clock.ticks_per_second == 0 {
            return Err(EmulatorError::InvalidConfig(
                "clock.ticks_per_second must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for MachineConfig {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}
