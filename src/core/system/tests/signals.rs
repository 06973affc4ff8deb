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

//! Signal line tests (HRQ/HLDA, A20)

use super::super::*;
use super::*;

#[test]
fn test_hrq_line() {
    let m = machine();

    m.system.raise_hrq();
    assert!(m.system.is_hrq_high());
    m.system.raise_hrq();
    assert!(m.system.is_hrq_high());

    m.system.lower_hrq();
    assert!(!m.system.is_hrq_high());
    // HRQ is a system-owned wire; no collaborator is involved
    assert!(m.calls().is_empty());
}

#[test]
fn test_hold_handshake() {
    let m = machine();

    m.system.raise_hrq();
    m.system.raise_hlda().unwrap();
    m.system.lower_hrq();

    assert_eq!(m.calls(), ["dma.raise_hlda"]);
    assert!(!m.system.is_hrq_high());
}

#[test]
fn test_a20_mask() {
    let m = machine();
    assert_eq!(m.system.a20_mask(), A20_DISABLED_MASK);

    m.system.set_enable_a20(true);
    assert!(m.system.is_a20_enabled());
    assert_eq!(m.system.a20_mask(), 0xFFFF_FFFF);

    // Bit 20 is forced low: 0x10FFEF aliases 0x0FFEF
    m.system.set_enable_a20(false);
    assert_eq!(0x0010_FFEF & m.system.a20_mask(), 0x0000_FFEF);
}

#[test]
fn test_reset_closes_a20_gate() {
    let m = machine();
    m.boot().unwrap();
    m.system.set_enable_a20(true);

    m.system.reset().unwrap();
    assert!(!m.system.is_a20_enabled());
}
