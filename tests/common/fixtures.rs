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

//! Test fixtures for common test scenarios

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pcsys::core::clock::ManualClock;
use pcsys::core::cpu::{CpuCore, CpuRegisters, InterruptObserver};
use pcsys::core::deferred::Deferred;
use pcsys::core::error::Result;
use pcsys::core::event::{SystemEvent, SystemEventKind};
use pcsys::core::interrupt::InterruptController;
use pcsys::core::io::PortIoBus;
use pcsys::core::memory::PhysicalMemory;
use pcsys::core::plugin::NetworkAdapter;
use pcsys::core::system::System;

/// CPU core that records pin changes and lets tests inject interrupts
#[derive(Default)]
pub struct StubCpu {
    pub intr: Cell<bool>,
    pub runs: Cell<u32>,
    observers: RefCell<Vec<InterruptObserver>>,
}

impl StubCpu {
    #[allow(dead_code)]
    pub fn take_interrupt(&self, vector: u8) {
        for observer in self.observers.borrow_mut().iter_mut() {
            observer(vector);
        }
    }
}

impl CpuCore for StubCpu {
    fn registers(&self) -> CpuRegisters {
        CpuRegisters::default()
    }

    fn init(&self) -> Deferred {
        Deferred::done()
    }

    fn reset(&self) {
        self.intr.set(false);
    }

    fn run(&self) -> Result<()> {
        self.runs.set(self.runs.get() + 1);
        Ok(())
    }

    fn halt(&self) {}

    fn raise_intr(&self) {
        self.intr.set(true);
    }

    fn lower_intr(&self) {
        self.intr.set(false);
    }

    fn observe_interrupts(&self, observer: InterruptObserver) {
        self.observers.borrow_mut().push(observer);
    }
}

/// Interrupt controller that latches raised lines
#[derive(Default)]
pub struct LatchPic {
    pub lines: Cell<u16>,
}

impl InterruptController for LatchPic {
    fn acknowledge_interrupt(&self) -> u8 {
        let lines = self.lines.get();
        if lines == 0 {
            // Spurious interrupt on the master PIC
            return 0x0F;
        }
        let irq = lines.trailing_zeros() as u8;
        self.lines.set(lines & !(1 << irq));
        if irq < 8 {
            0x08 + irq
        } else {
            0x70 + irq - 8
        }
    }

    fn raise_irq(&self, irq: u8) {
        self.lines.set(self.lines.get() | (1 << irq));
    }

    fn lower_irq(&self, irq: u8) {
        self.lines.set(self.lines.get() & !(1 << irq));
    }
}

/// A system built from the reference collaborators
#[allow(dead_code)]
pub struct TestMachine {
    pub system: System,
    pub clock: Rc<ManualClock>,
    pub io: Rc<PortIoBus>,
    pub memory: Rc<PhysicalMemory>,
    pub cpu: Rc<StubCpu>,
    pub pic: Rc<LatchPic>,
    pub network: Rc<NetworkAdapter>,
}

/// Create a machine with 1 MiB of RAM and an NE2000 adapter on the bus
#[allow(dead_code)]
pub fn create_test_machine() -> TestMachine {
    let clock = Rc::new(ManualClock::default());
    let io = Rc::new(PortIoBus::new());
    let memory = Rc::new(PhysicalMemory::new(0x10_0000));
    let cpu = Rc::new(StubCpu::default());
    let pic = Rc::new(LatchPic::default());
    let network = Rc::new(NetworkAdapter::new());

    io.register_device(network.clone())
        .expect("Failed to register network adapter");

    let system = System::new(clock.clone(), io.clone(), memory.clone());
    system.set_cpu(cpu.clone());
    system.set_pic(pic.clone());
    system.set_rom_loader(memory.clone());

    TestMachine {
        system,
        clock,
        io,
        memory,
        cpu,
        pic,
        network,
    }
}

/// Record every event of `kinds` emitted by `system`
#[allow(dead_code)]
pub fn record_events(system: &System, kinds: &[SystemEventKind]) -> Rc<RefCell<Vec<SystemEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for &kind in kinds {
        let sink = Rc::clone(&seen);
        system.on(kind, move |event: &SystemEvent| sink.borrow_mut().push(event.clone()));
    }
    seen
}
