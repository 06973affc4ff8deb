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

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use log::{error, info};
use pcsys::core::clock::HostClock;
use pcsys::core::config::MachineConfig;
use pcsys::core::cpu::{CpuCore, CpuRegisters, InterruptObserver};
use pcsys::core::deferred::Deferred;
use pcsys::core::error::Result;
use pcsys::core::event::{SystemEvent, SystemEventKind};
use pcsys::core::io::PortIoBus;
use pcsys::core::memory::PhysicalMemory;
use pcsys::core::plugin::NetworkAdapter;
use pcsys::core::system::System;
use pcsys::core::timer::TimerMode;

/// PC system boot check
#[derive(Parser)]
#[command(name = "pcsys")]
#[command(about = "Boot a PC machine configuration and run asynchronous event passes", long_about = None)]
struct Args {
    /// Path to the machine configuration (TOML)
    config: PathBuf,

    /// Number of asynchronous event passes to run after boot
    #[arg(short = 'p', long, default_value = "10")]
    passes: usize,

    /// Physical memory size in KiB
    #[arg(short = 'm', long, default_value = "1024")]
    memory_kib: usize,
}

/// CPU core that boots to the reset vector and executes nothing
struct IdleCore {
    registers: Cell<CpuRegisters>,
    observers: RefCell<Vec<InterruptObserver>>,
}

impl IdleCore {
    fn new() -> Self {
        Self {
            registers: Cell::new(CpuRegisters::default()),
            observers: RefCell::new(Vec::new()),
        }
    }
}

impl CpuCore for IdleCore {
    fn registers(&self) -> CpuRegisters {
        self.registers.get()
    }

    fn init(&self) -> Deferred {
        Deferred::done()
    }

    fn reset(&self) {
        let mut registers = CpuRegisters::default();
        registers.segments[CpuRegisters::CS] = 0xF000;
        registers.eip = 0xFFF0;
        self.registers.set(registers);
    }

    fn run(&self) -> Result<()> {
        log::debug!("IdleCore: run at 0x{:05X}", self.registers.get().linear_ip());
        Ok(())
    }

    fn halt(&self) {}

    fn raise_intr(&self) {}

    fn lower_intr(&self) {}

    fn observe_interrupts(&self, observer: InterruptObserver) {
        self.observers.borrow_mut().push(observer);
    }
}

fn count_events(system: &System, kind: SystemEventKind) -> Rc<Cell<u64>> {
    let count = Rc::new(Cell::new(0));
    let counter = Rc::clone(&count);
    system.on(kind, move |_: &SystemEvent| counter.set(counter.get() + 1));
    count
}

fn main() -> Result<()> {
    // Optional .env for RUST_LOG and friends
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("pcsys v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    info!("Loading machine config from: {}", args.config.display());
    let config = MachineConfig::from_file(&args.config).inspect_err(|e| {
        error!("Failed to load config: {}", e);
    })?;

    let clock = Rc::new(HostClock::new(config.clock.ticks_per_second));
    let io = Rc::new(PortIoBus::new());
    io.register_device(Rc::new(NetworkAdapter::new()))?;
    let memory = Rc::new(PhysicalMemory::new(args.memory_kib * 1024));

    let system = System::new(clock, io, memory.clone());
    system.set_cpu(Rc::new(IdleCore::new()));
    system.set_rom_loader(memory);
    system.configure(&config)?;

    let async_passes = count_events(&system, SystemEventKind::AsyncEvents);
    let io_accesses = count_events(&system, SystemEventKind::IoWrite);

    let heartbeat = system.create_timer();
    let beats = Rc::new(Cell::new(0u64));
    let counter = Rc::clone(&beats);
    heartbeat.on_elapse(move |_| counter.set(counter.get() + 1));
    heartbeat.start(0, TimerMode::Periodic);

    info!("Booting...");
    if let Err(e) = pollster::block_on(system.init()) {
        error!("Boot failed: {}", e);
        return Err(e);
    }

    system.run()?;
    let registers = system.cpu_registers()?;
    info!("CPU at reset vector 0x{:05X}", registers.linear_ip());

    for _ in 0..args.passes {
        system.handle_asynchronous_events();
    }
    system.pause()?;

    info!("Boot check completed successfully!");
    info!("Asynchronous event passes: {}", async_passes.get());
    info!("Heartbeat timer fired: {}", beats.get());
    info!("I/O writes observed: {}", io_accesses.get());
    info!("Equipment: {:?}", system.equipment());

    Ok(())
}
