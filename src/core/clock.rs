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

//! Emulator clock sources
//!
//! The clock is the only source of time for the system. Timers and the
//! asynchronous event pass read tick counts from it; devices that need real
//! time (e.g. the RTC) read microseconds.
//!
//! Two implementations are provided:
//! - [`HostClock`]: derived from the host's monotonic clock
//! - [`ManualClock`]: advanced explicitly, for deterministic runs and tests

use std::cell::Cell;
use std::time::Instant;

/// Global tick counter type (absolute time in clock ticks since start)
pub type Ticks = u64;

/// Default tick rate (1 MHz, one tick per microsecond)
pub const DEFAULT_TICKS_PER_SECOND: u64 = 1_000_000;

/// Source of monotonic time for the emulated machine
pub trait Clock {
    /// Current tick count. Never decreases.
    fn ticks_now(&self) -> Ticks;

    /// Wall-clock microseconds since the clock started
    fn microseconds_now(&self) -> u64;
}

/// Clock driven by the host's monotonic clock
///
/// # Example
///
/// ```
/// use pcsys::core::clock::{Clock, HostClock};
///
/// let clock = HostClock::new(1_000_000);
/// let first = clock.ticks_now();
/// assert!(clock.ticks_now() >= first);
/// ```
#[derive(Debug)]
pub struct HostClock {
    start: Instant,
    ticks_per_second: u64,
}

impl HostClock {
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            start: Instant::now(),
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_SECOND)
    }
}

impl Clock for HostClock {
    fn ticks_now(&self) -> Ticks {
        let micros = self.start.elapsed().as_micros();
        (micros * self.ticks_per_second as u128 / 1_000_000) as Ticks
    }

    fn microseconds_now(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

/// Clock that only moves when told to
///
/// # Example
///
/// ```
/// use pcsys::core::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(2_000_000);
/// clock.advance(500);
/// assert_eq!(clock.ticks_now(), 500);
/// assert_eq!(clock.microseconds_now(), 250);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    ticks: Cell<Ticks>,
    ticks_per_second: u64,
}

impl ManualClock {
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            ticks: Cell::new(0),
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    /// Move time forward by `ticks`
    pub fn advance(&self, ticks: Ticks) {
        self.ticks.set(self.ticks.get().saturating_add(ticks));
    }

    /// Jump to an absolute tick count
    ///
    /// Requests to move backwards are ignored so the clock stays monotonic.
    pub fn set(&self, ticks: Ticks) {
        if ticks < self.ticks.get() {
            log::warn!(
                "ManualClock: refusing to move backwards ({} -> {})",
                self.ticks.get(),
                ticks
            );
            return;
        }
        self.ticks.set(ticks);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_SECOND)
    }
}

impl Clock for ManualClock {
    fn ticks_now(&self) -> Ticks {
        self.ticks.get()
    }

    fn microseconds_now(&self) -> u64 {
        (self.ticks.get() as u128 * 1_000_000 / self.ticks_per_second as u128) as u64
    }
}
