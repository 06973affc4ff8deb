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

//! System orchestration
//!
//! The system is the hub of the emulated PC. It holds shared references to
//! every collaborator (clock, CPU core, PIC, DMA controller, memory bus,
//! I/O bus), owns the signal lines that run between them, and exposes the
//! control surface the driver uses: `init()`, `run()`, `pause()`, `reset()`
//! and `handle_asynchronous_events()`.
//!
//! # Boot sequence
//!
//! ```text
//! init()
//!  ├─ phase 1: load queued plugins
//!  │    each plugin: look up its devices on the I/O bus, call setup()
//!  │    wait on the LoadBarrier until every setup has settled
//!  ├─ phase 2: forward CPU "interrupt" and I/O "io read"/"io write" events
//!  │    cpu.init().await
//!  │    io.init().await
//!  │    cpu.reset(); io.reset()
//!  └─ initialized
//! ```
//!
//! # Sharing
//!
//! Devices call back into the system while the CPU is running (raising
//! IRQs, requesting the bus, creating timers), so every operation takes
//! `&self` and state lives in `Cell`/`RefCell`. Collaborator handles are
//! cloned out of their slots before being called, so a collaborator may
//! re-enter the system without tripping a borrow.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use super::clock::{Clock, Ticks};
use super::config::MachineConfig;
use super::cpu::{CpuCore, CpuRegisters};
use super::dma::DmaController;
use super::error::{EmulatorError, Result};
use super::event::{Equipment, EventEmitter, FloppyDriveType, SystemEvent, SystemEventKind};
use super::interrupt::{InterruptController, Irq, IRQ_LINES};
use super::io::{IoAccess, IoBus};
use super::memory::{MemoryBus, RomLoader, RomType};
use super::plugin::{load_plugins, Plugin, PluginDescriptor, StandardPlugin};
use super::signal::SignalLine;
use super::timer::Timer;

#[cfg(test)]
mod tests;

/// A20 gate address mask with the gate enabled
pub const A20_ENABLED_MASK: u32 = 0xFFFF_FFFF;

/// A20 gate address mask with the gate disabled (bit 20 forced low)
pub const A20_DISABLED_MASK: u32 = 0xFFEF_FFFF;

/// Progress of `System::init()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
    /// A boot attempt was rejected; the system stays un-initialized
    Failed,
}

impl InitState {
    fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
        }
    }
}

/// Payload for [`System::write`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteData {
    /// Raw buffer, written to memory as a single block
    Buffer(Vec<u8>),
    /// Byte sequence, written to memory one byte at a time
    Bytes(Vec<u8>),
    /// Scalar value, written to an I/O port
    Value(u32),
}

impl WriteData {
    fn kind(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Bytes(_) => "byte sequence",
            Self::Value(_) => "scalar",
        }
    }
}

/// Options for [`System::write`]
///
/// `data` plus exactly one of `to` (physical address) or `port`.
///
/// # Example
///
/// ```
/// use pcsys::core::system::{WriteData, WriteRequest};
///
/// let request = WriteRequest::new()
///     .data(WriteData::Bytes(vec![1, 2, 3]))
///     .to(0x1000);
/// assert_eq!(request.to, Some(0x1000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteRequest {
    pub data: Option<WriteData>,
    /// Physical memory address
    pub to: Option<u32>,
    /// I/O port
    pub port: Option<u16>,
    /// Port access width in bytes (default 1)
    pub length: Option<u8>,
}

impl WriteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: WriteData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to(mut self, address: u32) -> Self {
        self.to = Some(address);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn length(mut self, length: u8) -> Self {
        self.length = Some(length);
        self
    }
}

fn attached<T: ?Sized>(
    slot: &RefCell<Option<Rc<T>>>,
    operation: &'static str,
    collaborator: &'static str,
) -> Result<Rc<T>> {
    slot.borrow()
        .clone()
        .ok_or(EmulatorError::MissingCollaborator {
            operation,
            collaborator,
        })
}

fn irq_line(operation: &'static str, irq: i32) -> Result<Irq> {
    Irq::new(irq).ok_or(EmulatorError::InvalidIrq { operation, irq })
}

/// PC system hub
///
/// # Components
/// - Clock: tick source for timers and the asynchronous event pass
/// - I/O bus: device registry, port writes, access events
/// - Memory bus: physical writes
/// - CPU core, PIC, DMA controller, ROM loader: attached with the `set_*` methods
///
/// # Example
///
/// ```
/// use pcsys::core::clock::ManualClock;
/// use pcsys::core::io::PortIoBus;
/// use pcsys::core::memory::PhysicalMemory;
/// use pcsys::core::system::System;
/// use std::rc::Rc;
///
/// let system = System::new(
///     Rc::new(ManualClock::default()),
///     Rc::new(PortIoBus::new()),
///     Rc::new(PhysicalMemory::new(0x10_0000)),
/// );
///
/// system.register_irq(6, "floppy").unwrap();
/// assert!(system.register_irq(6, "sound").is_err());
/// assert!(system.run().is_err());
/// ```
pub struct System {
    clock: Rc<dyn Clock>,
    io: Rc<dyn IoBus>,
    memory: Rc<dyn MemoryBus>,
    cpu: RefCell<Option<Rc<dyn CpuCore>>>,
    pic: RefCell<Option<Rc<dyn InterruptController>>>,
    dma: RefCell<Option<Rc<dyn DmaController>>>,
    rom_loader: RefCell<Option<Rc<dyn RomLoader>>>,
    /// Event fan-out (shared with the forwarding handlers installed at boot)
    events: Rc<EventEmitter<SystemEvent>>,
    /// Timers in creation order; never removed
    timers: RefCell<Vec<Rc<Timer>>>,
    /// IRQ line -> handler name
    irq_handlers: RefCell<[Option<String>; IRQ_LINES]>,
    /// Plugins waiting for the next `init()`
    plugins_to_load: RefCell<Vec<PluginDescriptor>>,
    /// DMA hold request
    hrq: SignalLine,
    /// Address line 20 gate
    a20: SignalLine,
    state: Cell<InitState>,
    running: Cell<bool>,
    equipment: Cell<Equipment>,
}

impl System {
    /// Create a system around its always-present collaborators
    ///
    /// The CPU core, PIC, DMA controller and ROM loader are attached
    /// separately, before `init()`.
    pub fn new(clock: Rc<dyn Clock>, io: Rc<dyn IoBus>, memory: Rc<dyn MemoryBus>) -> Self {
        Self {
            clock,
            io,
            memory,
            cpu: RefCell::new(None),
            pic: RefCell::new(None),
            dma: RefCell::new(None),
            rom_loader: RefCell::new(None),
            events: Rc::new(EventEmitter::new()),
            timers: RefCell::new(Vec::new()),
            irq_handlers: RefCell::new(Default::default()),
            plugins_to_load: RefCell::new(Vec::new()),
            hrq: SignalLine::new("HRQ"),
            a20: SignalLine::new("A20"),
            state: Cell::new(InitState::Uninitialized),
            running: Cell::new(false),
            equipment: Cell::new(Equipment::default()),
        }
    }

    pub fn set_cpu(&self, cpu: Rc<dyn CpuCore>) {
        *self.cpu.borrow_mut() = Some(cpu);
    }

    pub fn set_pic(&self, pic: Rc<dyn InterruptController>) {
        *self.pic.borrow_mut() = Some(pic);
    }

    pub fn set_dma(&self, dma: Rc<dyn DmaController>) {
        *self.dma.borrow_mut() = Some(dma);
    }

    pub fn set_rom_loader(&self, loader: Rc<dyn RomLoader>) {
        *self.rom_loader.borrow_mut() = Some(loader);
    }

    // ----- Boot -----

    /// Boot the machine
    ///
    /// Loads every queued plugin, waits for all of their device setups to
    /// settle, then wires event forwarding, initializes the CPU core and
    /// the I/O bus in that order and resets both.
    ///
    /// # Returns
    ///
    /// - `Ok(())` once the machine is initialized
    /// - `Err(EmulatorError::MissingIoDevice)` if a plugin names a device
    ///   the I/O bus does not have (no event forwarding is installed)
    /// - the first plugin, CPU or I/O initialization failure, unchanged
    ///
    /// A rejected boot leaves the system un-initialized; calling `init()`
    /// again is an `AlreadyInitialized` error.
    pub async fn init(&self) -> Result<()> {
        let state = self.state.get();
        if state != InitState::Uninitialized {
            return Err(EmulatorError::AlreadyInitialized(state.name()));
        }
        let cpu = attached(&self.cpu, "init", "CPU core")?;

        self.state.set(InitState::Initializing);
        match self.boot(cpu).await {
            Ok(()) => {
                self.state.set(InitState::Initialized);
                log::info!("System: initialized");
                Ok(())
            }
            Err(err) => {
                self.state.set(InitState::Failed);
                log::error!("System: init failed: {}", err);
                Err(err)
            }
        }
    }

    async fn boot(&self, cpu: Rc<dyn CpuCore>) -> Result<()> {
        let plugins = std::mem::take(&mut *self.plugins_to_load.borrow_mut());
        log::info!("System: phase 1, loading {} plugin(s)", plugins.len());

        let barrier = load_plugins(self.io.as_ref(), plugins)?;
        barrier.await?;
        log::info!("System: phase 1 complete, all plugins loaded");

        self.forward_events(cpu.as_ref());

        log::info!("System: initializing CPU core");
        cpu.init().await?;
        log::info!("System: initializing I/O bus");
        self.io.init().await?;

        cpu.reset();
        self.io.reset();
        Ok(())
    }

    /// Re-emit CPU interrupts and I/O accesses as system events
    fn forward_events(&self, cpu: &dyn CpuCore) {
        let events = Rc::clone(&self.events);
        cpu.observe_interrupts(Box::new(move |vector| {
            events.emit(SystemEvent::Interrupt { vector });
        }));

        let events = Rc::clone(&self.events);
        self.io.observe(Box::new(move |access| {
            events.emit(match *access {
                IoAccess::Read { port, length } => SystemEvent::IoRead { port, length },
                IoAccess::Write {
                    port,
                    value,
                    length,
                } => SystemEvent::IoWrite {
                    port,
                    value,
                    length,
                },
            });
        }));
        log::info!("System: CPU and I/O events wired");
    }

    // ----- Control surface -----

    /// Hand the execution loop to the CPU core
    ///
    /// Fails with `NotInitialized` until `init()` has succeeded.
    pub fn run(&self) -> Result<()> {
        if self.state.get() != InitState::Initialized {
            return Err(EmulatorError::NotInitialized("run"));
        }
        let cpu = attached(&self.cpu, "run", "CPU core")?;

        self.running.set(true);
        cpu.run()
    }

    /// Stop the CPU core and notify "pause" observers
    ///
    /// The machine stays initialized; `run()` resumes it.
    pub fn pause(&self) -> Result<()> {
        let cpu = attached(&self.cpu, "pause", "CPU core")?;

        self.running.set(false);
        cpu.halt();
        self.events.emit(SystemEvent::Pause);
        Ok(())
    }

    /// Hardware reset: disable the A20 gate, reset the CPU core and I/O bus
    pub fn reset(&self) -> Result<()> {
        let cpu = attached(&self.cpu, "reset", "CPU core")?;

        self.set_enable_a20(false);
        cpu.reset();
        self.io.reset();
        log::debug!("System: hardware reset");
        Ok(())
    }

    /// Tick every timer once with the current tick count
    ///
    /// Timers are ticked in creation order and all see the same tick value.
    /// Timers created during the pass are first ticked on the next pass.
    pub fn handle_asynchronous_events(&self) {
        let ticks = self.clock.ticks_now();
        let timers: Vec<Rc<Timer>> = self.timers.borrow().clone();

        for timer in &timers {
            timer.tick(ticks);
        }
        self.events.emit(SystemEvent::AsyncEvents);
    }

    // ----- Signal lines -----

    pub fn raise_hrq(&self) {
        self.hrq.raise();
    }

    pub fn lower_hrq(&self) {
        self.hrq.lower();
    }

    pub fn is_hrq_high(&self) -> bool {
        self.hrq.is_high()
    }

    /// Grant the bus to the DMA controller
    pub fn raise_hlda(&self) -> Result<()> {
        attached(&self.dma, "raise_hlda", "DMA controller")?.raise_hlda();
        Ok(())
    }

    pub fn raise_intr(&self) -> Result<()> {
        attached(&self.cpu, "raise_intr", "CPU core")?.raise_intr();
        Ok(())
    }

    pub fn lower_intr(&self) -> Result<()> {
        attached(&self.cpu, "lower_intr", "CPU core")?.lower_intr();
        Ok(())
    }

    pub fn set_enable_a20(&self, enabled: bool) {
        self.a20.set(enabled);
    }

    pub fn is_a20_enabled(&self) -> bool {
        self.a20.is_high()
    }

    /// Mask to apply to physical addresses for the current A20 state
    pub fn a20_mask(&self) -> u32 {
        if self.is_a20_enabled() {
            A20_ENABLED_MASK
        } else {
            A20_DISABLED_MASK
        }
    }

    // ----- Interrupts -----

    /// Raise an IRQ line
    ///
    /// "irq high" observers run before the interrupt controller sees the
    /// line change.
    pub fn raise_irq(&self, irq: i32) -> Result<()> {
        let line = irq_line("raise_irq", irq)?;
        let pic = attached(&self.pic, "raise_irq", "interrupt controller")?;

        self.events.emit(SystemEvent::IrqHigh(line.line()));
        pic.raise_irq(line.line());
        Ok(())
    }

    /// Lower an IRQ line ("irq low" observers run first)
    pub fn lower_irq(&self, irq: i32) -> Result<()> {
        let line = irq_line("lower_irq", irq)?;
        let pic = attached(&self.pic, "lower_irq", "interrupt controller")?;

        self.events.emit(SystemEvent::IrqLow(line.line()));
        pic.lower_irq(line.line());
        Ok(())
    }

    /// Run an interrupt acknowledge cycle and return the vector
    pub fn acknowledge_interrupt(&self) -> Result<u8> {
        let pic = attached(&self.pic, "acknowledge_interrupt", "interrupt controller")?;
        Ok(pic.acknowledge_interrupt())
    }

    /// Claim an IRQ line for `handler`
    ///
    /// # Arguments
    ///
    /// * `irq` - Line number, 0-15
    /// * `handler` - Name of the claiming device, reported in conflicts
    ///
    /// # Returns
    ///
    /// - `Err(EmulatorError::InvalidIrq)` outside 0-15
    /// - `Err(EmulatorError::IrqConflict)` if the line is already claimed
    pub fn register_irq(&self, irq: i32, handler: impl Into<String>) -> Result<()> {
        let line = irq_line("register_irq", irq)?;
        let handler = handler.into();
        let mut handlers = self.irq_handlers.borrow_mut();

        if let Some(owner) = &handlers[line.index()] {
            return Err(EmulatorError::IrqConflict {
                irq: line.line(),
                handler,
                owner: owner.clone(),
            });
        }

        log::debug!("System: {} claimed by '{}'", line, handler);
        handlers[line.index()] = Some(handler);
        Ok(())
    }

    /// Name of the handler holding `irq`, if any
    pub fn irq_owner(&self, irq: i32) -> Option<String> {
        let line = Irq::new(irq)?;
        self.irq_handlers.borrow()[line.index()].clone()
    }

    // ----- Timers -----

    /// Create a timer bound to the system clock
    ///
    /// The timer is ticked by every later `handle_asynchronous_events()`
    /// for the lifetime of the system.
    pub fn create_timer(&self) -> Rc<Timer> {
        let timer = Rc::new(Timer::new(Rc::clone(&self.clock)));
        self.timers.borrow_mut().push(Rc::clone(&timer));
        timer
    }

    pub fn timer_count(&self) -> usize {
        self.timers.borrow().len()
    }

    // ----- Memory and I/O -----

    /// Write to physical memory or an I/O port
    ///
    /// | target | data | effect |
    /// |---|---|---|
    /// | `to` | `Buffer` | one block write at `to` |
    /// | `to` | `Bytes` | one byte write per element at `to + i`, ascending |
    /// | `port` | `Value` | I/O bus write of `length` bytes (default 1) |
    ///
    /// Missing `data`, a missing target, both targets, or data that does
    /// not suit the target are configuration errors.
    pub fn write(&self, request: WriteRequest) -> Result<()> {
        let data = request.data.ok_or(EmulatorError::MissingWriteOption("data"))?;

        match (request.to, request.port) {
            (Some(to), Some(port)) => Err(EmulatorError::ConflictingWriteTarget { to, port }),
            (None, None) => Err(EmulatorError::MissingWriteOption("to' or 'port")),
            (Some(to), None) => match data {
                WriteData::Buffer(buffer) => {
                    self.memory.write_block(to, &buffer);
                    Ok(())
                }
                WriteData::Bytes(bytes) => {
                    for (offset, byte) in bytes.iter().enumerate() {
                        self.memory.write_byte(to.wrapping_add(offset as u32), *byte);
                    }
                    Ok(())
                }
                other => Err(EmulatorError::InvalidWriteData {
                    kind: other.kind(),
                    target: "memory",
                }),
            },
            (None, Some(port)) => match data {
                WriteData::Value(value) => {
                    self.io.write(port, value, request.length.unwrap_or(1));
                    Ok(())
                }
                other => Err(EmulatorError::InvalidWriteData {
                    kind: other.kind(),
                    target: "an I/O port",
                }),
            },
        }
    }

    /// Place a ROM image through the ROM loader
    pub fn load_rom(&self, buffer: &[u8], address: u32, rom_type: RomType) -> Result<()> {
        let loader = attached(&self.rom_loader, "load_rom", "ROM loader")?;
        log::debug!(
            "System: loading {} ROM ({} bytes) at 0x{:08X}",
            rom_type,
            buffer.len(),
            address
        );
        loader.load_rom(buffer, address, rom_type.code())
    }

    // ----- Plugins -----

    /// Queue a standard plugin by catalog key for the next `init()`
    pub fn load_plugin(&self, identifier: &str) -> Result<()> {
        let plugin: StandardPlugin = identifier.parse()?;
        self.queue_plugin(PluginDescriptor::Standard(plugin));
        Ok(())
    }

    /// Queue a plugin instance for the next `init()`
    pub fn load_plugin_instance<P: Plugin + 'static>(&self, plugin: P) {
        self.queue_plugin(PluginDescriptor::Instance(Box::new(plugin)));
    }

    fn queue_plugin(&self, descriptor: PluginDescriptor) {
        if self.state.get() != InitState::Uninitialized {
            log::warn!(
                "System: plugin '{}' queued after boot, it will never be loaded",
                descriptor.name()
            );
        }
        log::debug!("System: queued plugin '{}'", descriptor.name());
        self.plugins_to_load.borrow_mut().push(descriptor);
    }

    pub fn pending_plugins(&self) -> usize {
        self.plugins_to_load.borrow().len()
    }

    /// Apply a machine configuration
    ///
    /// Queues the configured plugins, sets the floppy equipment and loads
    /// every ROM image from disk.
    pub fn configure(&self, config: &MachineConfig) -> Result<()> {
        for plugin in config.standard_plugins()? {
            self.queue_plugin(PluginDescriptor::Standard(plugin));
        }

        self.set_floppy_drive_type(config.floppy.drive_type);
        self.set_supported_floppies(config.floppy.count);

        for rom in config.rom_images()? {
            self.load_rom_file(&rom.path, rom.address, rom.rom_type)?;
        }
        Ok(())
    }

    fn load_rom_file(&self, path: &Path, address: u32, rom_type: RomType) -> Result<()> {
        let buffer = std::fs::read(path)?;
        log::info!("System: ROM image {}", path.display());
        self.load_rom(&buffer, address, rom_type)
    }

    // ----- Events and equipment -----

    /// Subscribe to system events of `kind`
    pub fn on<F>(&self, kind: SystemEventKind, observer: F)
    where
        F: Fn(&SystemEvent) + 'static,
    {
        self.events.on(kind, observer);
    }

    /// Watch the equipment configuration
    ///
    /// `callback` is subscribed to changes first, then runs once straight
    /// away with the current equipment. A change made from that first call
    /// is reported to it as well.
    pub fn observe_equipment<F>(&self, callback: F)
    where
        F: Fn(&Equipment) + 'static,
    {
        let callback = Rc::new(callback);

        let observer = Rc::clone(&callback);
        self.events
            .on(SystemEventKind::EquipmentChange, move |event: &SystemEvent| {
                if let SystemEvent::EquipmentChange(equipment) = event {
                    observer(equipment);
                }
            });
        callback(&self.equipment.get());
    }

    pub fn equipment(&self) -> Equipment {
        self.equipment.get()
    }

    pub fn floppy_drive_type(&self) -> FloppyDriveType {
        self.equipment.get().floppy_drive_type
    }

    pub fn set_floppy_drive_type(&self, drive_type: FloppyDriveType) {
        self.update_equipment(|equipment| equipment.floppy_drive_type = drive_type);
    }

    pub fn supported_floppies(&self) -> u8 {
        self.equipment.get().supported_floppies
    }

    pub fn set_supported_floppies(&self, count: u8) {
        self.update_equipment(|equipment| equipment.supported_floppies = count);
    }

    fn update_equipment(&self, change: impl FnOnce(&mut Equipment)) {
        let mut equipment = self.equipment.get();
        change(&mut equipment);
        self.equipment.set(equipment);
        self.events.emit(SystemEvent::EquipmentChange(equipment));
    }

    // ----- Accessors -----

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn ticks_now(&self) -> Ticks {
        self.clock.ticks_now()
    }

    pub fn microseconds_now(&self) -> u64 {
        self.clock.microseconds_now()
    }

    pub fn cpu_registers(&self) -> Result<CpuRegisters> {
        Ok(attached(&self.cpu, "cpu_registers", "CPU core")?.registers())
    }

    pub fn init_state(&self) -> InitState {
        self.state.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get() == InitState::Initialized
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}
