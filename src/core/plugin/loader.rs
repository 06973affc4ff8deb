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

//! Plugin loading barrier
//!
//! Loading walks the plugin queue in order. For each plugin the loader
//! resolves every device the plugin names on the I/O bus and dispatches the
//! setup function with that device's plugin data. Setups that finish
//! synchronously settle on the spot; the rest are collected into a
//! [`LoadBarrier`], which resolves once every outstanding setup has
//! finished.
//!
//! ```text
//! plugin A ─ mark_loading ─┬─ setup "VGA"  (Ready)   ─ mark_loaded
//!                          └─ setup "NE2K" (Pending) ─┐
//!          ─ mark_loaded                              │
//! plugin B ─ ...                                      │
//! barrier: remaining == 0 ◀───────────────────────────┘
//! ```
//!
//! Each plugin holds one count for the duration of its own dispatch, so the
//! barrier cannot complete part way through a plugin's setup map.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

use super::PluginDescriptor;
use crate::core::deferred::Deferred;
use crate::core::error::{EmulatorError, Result};
use crate::core::io::IoBus;

/// Completion barrier for plugin setups
///
/// Resolves to `Ok(())` once every operation marked loading has been marked
/// loaded, or to the first error reported by a setup.
#[derive(Default)]
pub struct LoadBarrier {
    /// Operations started but not yet finished
    remaining: usize,
    /// Asynchronous setups still in flight
    pending: FuturesUnordered<LocalBoxFuture<'static, Result<()>>>,
    /// First synchronous failure
    failure: Option<EmulatorError>,
}

impl LoadBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// An operation has started
    pub fn mark_loading(&mut self) {
        self.remaining += 1;
    }

    /// An operation has finished
    pub fn mark_loaded(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Track a setup result
    ///
    /// Ready results settle immediately; pending ones stay counted until
    /// the barrier is polled to completion.
    pub fn track(&mut self, deferred: Deferred) {
        self.mark_loading();
        match deferred {
            Deferred::Ready(Ok(())) => self.mark_loaded(),
            Deferred::Ready(Err(err)) => {
                self.mark_loaded();
                if self.failure.is_none() {
                    self.failure = Some(err);
                }
            }
            Deferred::Pending(future) => self.pending.push(future),
        }
    }

    /// Whether the barrier would complete without waiting
    pub fn is_settled(&self) -> bool {
        self.failure.is_some() || self.remaining == 0
    }
}

impl Future for LoadBarrier {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(err) = this.failure.take() {
            return Poll::Ready(Err(err));
        }

        loop {
            if this.remaining == 0 {
                return Poll::Ready(Ok(()));
            }

            match this.pending.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(()))) => this.mark_loaded(),
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Err(err)),
                // Counts without a future behind them can never settle
                Poll::Ready(None) => {
                    log::warn!(
                        "LoadBarrier: {} operation(s) marked loading with nothing in flight",
                        this.remaining
                    );
                    this.remaining = 0;
                    return Poll::Ready(Ok(()));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl std::fmt::Debug for LoadBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBarrier")
            .field("remaining", &self.remaining)
            .field("in_flight", &self.pending.len())
            .field("failure", &self.failure)
            .finish()
    }
}

/// Dispatch every queued plugin's setup functions
///
/// Returns the barrier to await for asynchronous setups. A device that is
/// not registered on the bus stops loading at once, before any later setup
/// is dispatched; so does a setup that fails synchronously.
pub fn load_plugins(io: &dyn IoBus, plugins: Vec<PluginDescriptor>) -> Result<LoadBarrier> {
    let mut barrier = LoadBarrier::new();

    for descriptor in plugins {
        let plugin = descriptor.resolve();
        let name = plugin.name().to_string();
        barrier.mark_loading();

        let setups = plugin.setup_io_devices();
        log::debug!("Loading plugin '{}' for {:?}", name, setups);

        for (identifier, setup) in setups {
            let device = io
                .registered_device(&identifier)
                .ok_or_else(|| EmulatorError::MissingIoDevice {
                    identifier: identifier.clone(),
                })?;

            log::debug!("Plugin '{}': setting up device '{}'", name, identifier);
            barrier.track(setup(device.plugin_data()));

            if let Some(err) = barrier.failure.take() {
                log::error!("Plugin '{}' failed to set up '{}': {}", name, identifier, err);
                return Err(err);
            }
        }

        barrier.mark_loaded();
    }

    Ok(barrier)
}

#[cfg(test)]
mod tests {
    use super::super::{Plugin, PluginData, SetupMap};
    use super::*;
    use crate::core::io::{AccessObserver, IoDevice};
    use futures::channel::oneshot;
    use futures::FutureExt;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Device(&'static str);

    impl IoDevice for Device {
        fn identifier(&self) -> &str {
            self.0
        }

        fn plugin_data(&self) -> PluginData {
            Rc::new(self.0) as Rc<dyn Any>
        }
    }

    struct Bus {
        devices: Vec<Rc<dyn IoDevice>>,
    }

    impl IoBus for Bus {
        fn write(&self, _port: u16, _value: u32, _length: u8) {}

        fn registered_device(&self, identifier: &str) -> Option<Rc<dyn IoDevice>> {
            self.devices
                .iter()
                .find(|device| device.identifier() == identifier)
                .cloned()
        }

        fn observe(&self, _observer: AccessObserver) {}

        fn init(&self) -> Deferred {
            Deferred::done()
        }

        fn reset(&self) {}
    }

    fn bus(identifiers: &[&'static str]) -> Bus {
        Bus {
            devices: identifiers
                .iter()
                .map(|identifier| Rc::new(Device(identifier)) as Rc<dyn IoDevice>)
                .collect(),
        }
    }

    /// Plugin built from a closure producing its setup map
    struct Scripted(&'static str, Box<dyn FnOnce() -> SetupMap>);

    impl Plugin for Scripted {
        fn name(&self) -> &str {
            self.0
        }

        fn setup_io_devices(self: Box<Self>) -> SetupMap {
            (self.1)()
        }
    }

    fn scripted(name: &'static str, setups: impl FnOnce() -> SetupMap + 'static) -> PluginDescriptor {
        PluginDescriptor::Instance(Box::new(Scripted(name, Box::new(setups))))
    }

    #[test]
    fn test_empty_queue_completes_immediately() {
        let barrier = load_plugins(&bus(&[]), Vec::new()).unwrap();
        assert!(barrier.is_settled());
        assert!(matches!(barrier.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn test_synchronous_setups_complete_immediately() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&calls);

        let plugin = scripted("sync", move || {
            let vga_log = Rc::clone(&log);
            SetupMap::new()
                .with("VGA", move |data| {
                    let name = data.downcast::<&'static str>().unwrap();
                    vga_log.borrow_mut().push(*name);
                    Deferred::done()
                })
                .with("NE2K", move |data| {
                    let name = data.downcast::<&'static str>().unwrap();
                    log.borrow_mut().push(*name);
                    Deferred::done()
                })
        });

        let barrier = load_plugins(&bus(&["VGA", "NE2K"]), vec![plugin]).unwrap();
        assert_eq!(barrier.remaining(), 0);
        assert!(matches!(barrier.now_or_never(), Some(Ok(()))));
        assert_eq!(*calls.borrow(), vec!["VGA", "NE2K"]);
    }

    #[test]
    fn test_barrier_waits_for_pending_setup() {
        let (tx, rx) = oneshot::channel::<()>();
        let plugin = scripted("slow", move || {
            SetupMap::new().with("NE2K", move |_| {
                Deferred::pending(async move {
                    let _ = rx.await;
                    Ok(())
                })
            })
        });

        let mut barrier = load_plugins(&bus(&["NE2K"]), vec![plugin]).unwrap();
        assert_eq!(barrier.remaining(), 1);
        assert!((&mut barrier).now_or_never().is_none());

        tx.send(()).unwrap();
        assert!(matches!(barrier.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn test_missing_device_fails_before_later_setups() {
        let later = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&later);

        let first = scripted("needs-vga", || SetupMap::new().with("VGA", |_| Deferred::done()));
        let second = scripted("needs-ne2k", move || {
            SetupMap::new().with("NE2K", move |_| {
                *flag.borrow_mut() = true;
                Deferred::done()
            })
        });

        let err = load_plugins(&bus(&["NE2K"]), vec![first, second]).unwrap_err();
        match err {
            EmulatorError::MissingIoDevice { identifier } => assert_eq!(identifier, "VGA"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!*later.borrow());
    }

    #[test]
    fn test_synchronous_failure_rejects() {
        let plugin = scripted("broken", || {
            SetupMap::new().with("VGA", |_| {
                Deferred::Ready(Err(EmulatorError::Plugin {
                    plugin: "broken".into(),
                    reason: "no framebuffer".into(),
                }))
            })
        });

        let err = load_plugins(&bus(&["VGA"]), vec![plugin]).unwrap_err();
        assert!(matches!(err, EmulatorError::Plugin { .. }));
    }

    #[test]
    fn test_asynchronous_failure_rejects_barrier() {
        let (tx, rx) = oneshot::channel::<()>();
        let plugin = scripted("late-failure", move || {
            SetupMap::new().with("NE2K", move |_| {
                Deferred::pending(async move {
                    let _ = rx.await;
                    Err(EmulatorError::Plugin {
                        plugin: "late-failure".into(),
                        reason: "link down".into(),
                    })
                })
            })
        });

        let mut barrier = load_plugins(&bus(&["NE2K"]), vec![plugin]).unwrap();
        assert!((&mut barrier).now_or_never().is_none());

        tx.send(()).unwrap();
        assert!(matches!(
            barrier.now_or_never(),
            Some(Err(EmulatorError::Plugin { .. }))
        ));
    }

    #[test]
    fn test_manual_counting() {
        let mut barrier = LoadBarrier::new();
        barrier.mark_loading();
        barrier.mark_loading();
        barrier.mark_loaded();
        assert_eq!(barrier.remaining(), 1);
        assert!(!barrier.is_settled());

        barrier.mark_loaded();
        barrier.mark_loaded();
        assert_eq!(barrier.remaining(), 0);
        assert!(matches!(barrier.now_or_never(), Some(Ok(()))));
    }
}
