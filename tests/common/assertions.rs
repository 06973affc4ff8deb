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

//! Custom assertions for system testing

use pcsys::core::event::SystemEvent;
use pcsys::core::memory::PhysicalMemory;

/// Assert memory holds `expected` starting at `addr`
#[allow(dead_code)]
pub fn assert_memory_bytes(memory: &PhysicalMemory, addr: u32, expected: &[u8]) {
    let actual = memory.read_block(addr, expected.len());
    assert_eq!(
        actual, expected,
        "Memory at 0x{:08X} mismatch: expected {:02X?}, got {:02X?}",
        addr, expected, actual
    );
}

/// Assert the recorded events match `expected` exactly, in order
#[allow(dead_code)]
pub fn assert_events(recorded: &[SystemEvent], expected: &[SystemEvent]) {
    assert_eq!(
        recorded, expected,
        "Event stream mismatch: expected {:?}, got {:?}",
        expected, recorded
    );
}
