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

//! Clock-driven timers
//!
//! Devices that need time-based behaviour (PIT channels, the RTC periodic
//! interrupt, floppy motor spin-up, NIC transmit delays) ask the system for a
//! [`Timer`] and arm it with an interval in clock ticks. The system ticks
//! every timer once per asynchronous event pass with the current tick count;
//! a timer whose due time has been reached calls its elapse handler.
//!
//! ## Scheduling
//!
//! ```text
//! start(interval)        next_due = now + interval
//! tick(t), t < next_due  nothing
//! tick(t), t >= next_due handler(t)
//!                        OneShot  -> disarmed
//!                        Periodic -> next_due += interval (skipping missed periods)
//! ```
//!
//! # Example
//!
//! ```
//! use pcsys::core::clock::{Clock, ManualClock};
//! use pcsys::core::timer::{Timer, TimerMode};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let clock = Rc::new(ManualClock::default());
//! let timer = Timer::new(clock.clone());
//! let fired = Rc::new(Cell::new(0));
//!
//! let count = Rc::clone(&fired);
//! timer.on_elapse(move |_| count.set(count.get() + 1));
//! timer.start(100, TimerMode::Periodic);
//!
//! clock.advance(100);
//! timer.tick(clock.ticks_now());
//! assert_eq!(fired.get(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::clock::{Clock, Ticks};

#[cfg(test)]
mod tests;

/// Whether a timer re-arms after elapsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    OneShot,
    Periodic,
}

/// Elapse handler (receives the tick count that fired it)
pub type ElapseHandler = Box<dyn FnMut(Ticks)>;

#[derive(Debug, Clone, Copy)]
struct Schedule {
    next_due: Ticks,
    interval: Ticks,
    mode: TimerMode,
}

/// A countdown/periodic timer bound to the system clock
pub struct Timer {
    clock: Rc<dyn Clock>,
    /// Armed schedule (None = stopped)
    schedule: Cell<Option<Schedule>>,
    /// Tick value from the most recent `tick()` call
    last_tick: Cell<Ticks>,
    /// Number of times the handler has run
    elapsed_count: Cell<u64>,
    handler: RefCell<Option<ElapseHandler>>,
}

impl Timer {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        let now = clock.ticks_now();
        Self {
            clock,
            schedule: Cell::new(None),
            last_tick: Cell::new(now),
            elapsed_count: Cell::new(0),
            handler: RefCell::new(None),
        }
    }

    /// Arm the timer to elapse `interval` ticks from now
    ///
    /// Restarting an armed timer replaces its schedule.
    pub fn start(&self, interval: Ticks, mode: TimerMode) {
        let now = self.clock.ticks_now();
        self.schedule.set(Some(Schedule {
            next_due: now.saturating_add(interval),
            interval,
            mode,
        }));
        log::trace!(
            "Timer armed: interval={} mode={:?} due={}",
            interval,
            mode,
            now.saturating_add(interval)
        );
    }

    pub fn stop(&self) {
        self.schedule.set(None);
    }

    pub fn is_active(&self) -> bool {
        self.schedule.get().is_some()
    }

    /// Tick count at which the timer next elapses
    pub fn next_due(&self) -> Option<Ticks> {
        self.schedule.get().map(|schedule| schedule.next_due)
    }

    pub fn elapsed_count(&self) -> u64 {
        self.elapsed_count.get()
    }

    /// Install the elapse handler, replacing any previous one
    pub fn on_elapse<F>(&self, handler: F)
    where
        F: FnMut(Ticks) + 'static,
    {
        *self.handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Advance the timer to `current_tick`
    ///
    /// Called once per asynchronous event pass. Tick values that go
    /// backwards are ignored.
    pub fn tick(&self, current_tick: Ticks) {
        if current_tick < self.last_tick.get() {
            log::warn!(
                "Timer: ignoring non-monotonic tick {} (last {})",
                current_tick,
                self.last_tick.get()
            );
            return;
        }
        self.last_tick.set(current_tick);

        let Some(mut schedule) = self.schedule.get() else {
            return;
        };
        if current_tick < schedule.next_due {
            return;
        }

        match schedule.mode {
            TimerMode::OneShot => self.schedule.set(None),
            TimerMode::Periodic => {
                schedule.next_due = schedule.next_due.saturating_add(schedule.interval);
                if schedule.next_due <= current_tick && schedule.interval > 0 {
                    // Missed whole periods are dropped, not replayed
                    let behind = current_tick - schedule.next_due;
                    let periods = behind / schedule.interval + 1;
                    schedule.next_due = schedule
                        .next_due
                        .saturating_add(periods.saturating_mul(schedule.interval));
                }
                self.schedule.set(Some(schedule));
            }
        }

        self.elapsed_count.set(self.elapsed_count.get() + 1);
        self.fire(current_tick);
    }

    fn fire(&self, current_tick: Ticks) {
        // Taken out for the call so the handler may re-arm or replace itself
        let handler = self.handler.borrow_mut().take();
        if let Some(mut handler) = handler {
            handler(current_tick);
            let mut slot = self.handler.borrow_mut();
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("schedule", &self.schedule.get())
            .field("last_tick", &self.last_tick.get())
            .field("elapsed_count", &self.elapsed_count.get())
            .finish_non_exhaustive()
    }
}
