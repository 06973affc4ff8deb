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

//! Timer tests
//!
//! Organized by behaviour: arming/stopping and one-shot versus periodic
//! scheduling.


use crate::core::clock::ManualClock;
use std::cell::RefCell;
use std::rc::Rc;

/// Timer on a fresh manual clock, recording every tick value it fires at
fn recording_timer() -> (Rc<ManualClock>, super::Timer, Rc<RefCell<Vec<u64>>>) {
    let clock = Rc::new(ManualClock::default());
    let timer = super::Timer::new(clock.clone());
    let fired = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&fired);
    timer.on_elapse(move |tick| sink.borrow_mut().push(tick));

    (clock, timer, fired)
}
