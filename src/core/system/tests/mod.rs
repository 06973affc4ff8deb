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

//! System module tests
//!
//! Collaborators are instrumented doubles that append to a shared call log,
//! so tests can check the order in which the system drives them.

mod signals;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;

use crate::core::clock::ManualClock;
use crate::core::cpu::{CpuCore, CpuRegisters, InterruptObserver};
use crate::core::deferred::Deferred;
use crate::core::dma::DmaController;
use crate::core::error::Result;
use crate::core::event::{SystemEvent, SystemEventKind};
use crate::core::interrupt::InterruptController;
use crate::core::io::{AccessObserver, IoAccess, IoBus, IoDevice};
use crate::core::memory::{MemoryBus, RomLoader};
use crate::core::plugin::{downcast_plugin_data, Plugin, PluginData, SetupMap};

use super::System;

pub(super) type CallLog = Rc<RefCell<Vec<String>>>;

/// Gate for a deferred step: send `Ok(())` or an error to settle it
pub(super) type Gate = oneshot::Sender<Result<()>>;

fn gated(log: &CallLog, step: &'static str, gate: &RefCell<Option<oneshot::Receiver<Result<()>>>>) -> Deferred {
    log.borrow_mut().push(step.to_string());
    match gate.borrow_mut().take() {
        Some(rx) => Deferred::pending(async move { rx.await.unwrap_or(Ok(())) }),
        None => Deferred::done(),
    }
}

fn open_gate(slot: &RefCell<Option<oneshot::Receiver<Result<()>>>>) -> Gate {
    let (tx, rx) = oneshot::channel();
    *slot.borrow_mut() = Some(rx);
    tx
}

pub(super) struct TestCpu {
    log: CallLog,
    pub registers: Cell<CpuRegisters>,
    init_gate: RefCell<Option<oneshot::Receiver<Result<()>>>>,
    observers: RefCell<Vec<InterruptObserver>>,
    pub intr: Cell<bool>,
    pub halted: Cell<bool>,
}

impl TestCpu {
    /// Make the next `init()` wait on the returned gate
    pub fn gate_init(&self) -> Gate {
        open_gate(&self.init_gate)
    }

    /// Simulate the core taking an interrupt
    pub fn take_interrupt(&self, vector: u8) {
        for observer in self.observers.borrow_mut().iter_mut() {
            observer(vector);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }
}

impl CpuCore for TestCpu {
    fn registers(&self) -> CpuRegisters {
        self.registers.get()
    }

    fn init(&self) -> Deferred {
        gated(&self.log, "cpu.init", &self.init_gate)
    }

    fn reset(&self) {
        self.log.borrow_mut().push("cpu.reset".into());
        self.halted.set(false);
    }

    fn run(&self) -> Result<()> {
        self.log.borrow_mut().push("cpu.run".into());
        self.halted.set(false);
        Ok(())
    }

    fn halt(&self) {
        self.log.borrow_mut().push("cpu.halt".into());
        self.halted.set(true);
    }

    fn raise_intr(&self) {
        self.log.borrow_mut().push("cpu.raise_intr".into());
        self.intr.set(true);
    }

    fn lower_intr(&self) {
        self.log.borrow_mut().push("cpu.lower_intr".into());
        self.intr.set(false);
    }

    fn observe_interrupts(&self, observer: InterruptObserver) {
        self.log.borrow_mut().push("cpu.observe".into());
        self.observers.borrow_mut().push(observer);
    }
}

/// Plugin data handed out by [`TestDevice`]: names of attached plugins
pub(super) type Attachments = RefCell<Vec<String>>;

pub(super) struct TestDevice {
    identifier: &'static str,
    attachments: Rc<Attachments>,
}

impl TestDevice {
    pub fn attached(&self) -> Vec<String> {
        self.attachments.borrow().clone()
    }
}

impl IoDevice for TestDevice {
    fn identifier(&self) -> &str {
        self.identifier
    }

    fn plugin_data(&self) -> PluginData {
        self.attachments.clone() as Rc<dyn Any>
    }
}

pub(super) struct TestIoBus {
    log: CallLog,
    devices: RefCell<Vec<Rc<TestDevice>>>,
    observers: RefCell<Vec<Rc<dyn Fn(&IoAccess)>>>,
    pub writes: RefCell<Vec<(u16, u32, u8)>>,
    init_gate: RefCell<Option<oneshot::Receiver<Result<()>>>>,
}

impl TestIoBus {
    pub fn add_device(&self, identifier: &'static str) -> Rc<TestDevice> {
        let device = Rc::new(TestDevice {
            identifier,
            attachments: Rc::new(RefCell::new(Vec::new())),
        });
        self.devices.borrow_mut().push(Rc::clone(&device));
        device
    }

    pub fn gate_init(&self) -> Gate {
        open_gate(&self.init_gate)
    }

    /// Simulate a port access reaching the bus
    pub fn access(&self, access: IoAccess) {
        let observers: Vec<_> = self.observers.borrow().clone();
        for observer in observers {
            observer(&access);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }
}

impl IoBus for TestIoBus {
    fn write(&self, port: u16, value: u32, length: u8) {
        self.writes.borrow_mut().push((port, value, length));
        self.access(IoAccess::Write {
            port,
            value,
            length,
        });
    }

    fn registered_device(&self, identifier: &str) -> Option<Rc<dyn IoDevice>> {
        self.devices
            .borrow()
            .iter()
            .find(|device| device.identifier == identifier)
            .map(|device| Rc::clone(device) as Rc<dyn IoDevice>)
    }

    fn observe(&self, observer: AccessObserver) {
        self.log.borrow_mut().push("io.observe".into());
        self.observers.borrow_mut().push(Rc::from(observer));
    }

    fn init(&self) -> Deferred {
        gated(&self.log, "io.init", &self.init_gate)
    }

    fn reset(&self) {
        self.log.borrow_mut().push("io.reset".into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum MemoryWrite {
    Byte(u32, u8),
    Block(u32, Vec<u8>),
}

#[derive(Default)]
pub(super) struct TestMemory {
    pub writes: RefCell<Vec<MemoryWrite>>,
}

impl MemoryBus for TestMemory {
    fn write_byte(&self, address: u32, value: u8) {
        self.writes
            .borrow_mut()
            .push(MemoryWrite::Byte(address, value));
    }

    fn write_block(&self, address: u32, data: &[u8]) {
        self.writes
            .borrow_mut()
            .push(MemoryWrite::Block(address, data.to_vec()));
    }
}

pub(super) struct TestPic {
    log: CallLog,
    pub vector: Cell<u8>,
}

impl InterruptController for TestPic {
    fn acknowledge_interrupt(&self) -> u8 {
        self.log.borrow_mut().push("pic.acknowledge".into());
        self.vector.get()
    }

    fn raise_irq(&self, irq: u8) {
        self.log.borrow_mut().push(format!("pic.raise_irq({})", irq));
    }

    fn lower_irq(&self, irq: u8) {
        self.log.borrow_mut().push(format!("pic.lower_irq({})", irq));
    }
}

pub(super) struct TestDma {
    log: CallLog,
}

impl DmaController for TestDma {
    fn raise_hlda(&self) {
        self.log.borrow_mut().push("dma.raise_hlda".into());
    }
}

#[derive(Default)]
pub(super) struct TestRomLoader {
    pub loads: RefCell<Vec<(Vec<u8>, u32, u8)>>,
}

impl RomLoader for TestRomLoader {
    fn load_rom(&self, buffer: &[u8], address: u32, type_code: u8) -> Result<()> {
        self.loads
            .borrow_mut()
            .push((buffer.to_vec(), address, type_code));
        Ok(())
    }
}

/// Plugin that records itself on each device it names
pub(super) struct TestPlugin {
    name: &'static str,
    devices: Vec<&'static str>,
    gate: Option<oneshot::Receiver<Result<()>>>,
}

impl TestPlugin {
    pub fn new(name: &'static str, devices: &[&'static str]) -> Self {
        Self {
            name,
            devices: devices.to_vec(),
            gate: None,
        }
    }

    /// Make the first device's setup wait on the returned gate
    pub fn gated(mut self) -> (Self, Gate) {
        let (tx, rx) = oneshot::channel();
        self.gate = Some(rx);
        (self, tx)
    }
}

impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn setup_io_devices(self: Box<Self>) -> SetupMap {
        let TestPlugin {
            name,
            devices,
            mut gate,
        } = *self;

        let mut setups = SetupMap::new();
        for device in devices {
            let gate = gate.take();
            setups.insert(device, move |data| {
                let attachments = match downcast_plugin_data::<Attachments>(name, data) {
                    Ok(attachments) => attachments,
                    Err(err) => return Deferred::Ready(Err(err)),
                };
                attachments.borrow_mut().push(name.to_string());
                match gate {
                    Some(rx) => Deferred::pending(async move { rx.await.unwrap_or(Ok(())) }),
                    None => Deferred::done(),
                }
            });
        }
        setups
    }
}

/// A system wired to instrumented collaborators
pub(super) struct Machine {
    pub system: System,
    pub clock: Rc<ManualClock>,
    pub cpu: Rc<TestCpu>,
    pub io: Rc<TestIoBus>,
    pub memory: Rc<TestMemory>,
    pub pic: Rc<TestPic>,
    pub roms: Rc<TestRomLoader>,
    pub log: CallLog,
}

impl Machine {
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Boot synchronously (every collaborator completes at once)
    pub fn boot(&self) -> Result<()> {
        pollster::block_on(self.system.init())
    }

    /// Record every event of the given kinds, in emission order
    pub fn record(&self, kinds: &[SystemEventKind]) -> Rc<RefCell<Vec<SystemEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for &kind in kinds {
            let sink = Rc::clone(&seen);
            self.system
                .on(kind, move |event: &SystemEvent| sink.borrow_mut().push(event.clone()));
        }
        seen
    }
}

pub(super) fn machine() -> Machine {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));

    let clock = Rc::new(ManualClock::default());
    let cpu = Rc::new(TestCpu {
        log: Rc::clone(&log),
        registers: Cell::new(CpuRegisters::default()),
        init_gate: RefCell::new(None),
        observers: RefCell::new(Vec::new()),
        intr: Cell::new(false),
        halted: Cell::new(false),
    });
    let io = Rc::new(TestIoBus {
        log: Rc::clone(&log),
        devices: RefCell::new(Vec::new()),
        observers: RefCell::new(Vec::new()),
        writes: RefCell::new(Vec::new()),
        init_gate: RefCell::new(None),
    });
    let memory = Rc::new(TestMemory::default());
    let pic = Rc::new(TestPic {
        log: Rc::clone(&log),
        vector: Cell::new(0x08),
    });
    let dma = Rc::new(TestDma {
        log: Rc::clone(&log),
    });
    let roms = Rc::new(TestRomLoader::default());

    let system = System::new(clock.clone(), io.clone(), memory.clone());
    system.set_cpu(cpu.clone());
    system.set_pic(pic.clone());
    system.set_dma(dma);
    system.set_rom_loader(roms.clone());

    Machine {
        system,
        clock,
        cpu,
        io,
        memory,
        pic,
        roms,
        log,
    }
}
