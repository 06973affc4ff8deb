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

//! Single-bit hardware wires (HRQ, A20, ...)

use std::cell::Cell;

/// A named boolean wire
///
/// Lines are shared between the components that drive and sample them,
/// so state changes go through `&self`.
///
/// # Example
///
/// ```
/// use pcsys::core::signal::SignalLine;
///
/// let hrq = SignalLine::new("HRQ");
/// assert!(!hrq.is_high());
///
/// hrq.raise();
/// assert!(hrq.is_high());
///
/// hrq.lower();
/// assert!(!hrq.is_high());
/// ```
#[derive(Debug)]
pub struct SignalLine {
    name: &'static str,
    high: Cell<bool>,
}

impl SignalLine {
    /// Create a line in the low state
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            high: Cell::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn raise(&self) {
        self.set(true);
    }

    pub fn lower(&self) {
        self.set(false);
    }

    /// Drive the line to `high`
    pub fn set(&self, high: bool) {
        if self.high.replace(high) != high {
            log::trace!("{} -> {}", self.name, if high { "high" } else { "low" });
        }
    }

    pub fn is_high(&self) -> bool {
        self.high.get()
    }
}
