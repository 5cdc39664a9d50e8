// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CPU-adaptive admission control.
//!
//! The sampled process CPU drives a three-state [`OperatingMode`]:
//!
//! | Mode | Live delivery | In flight | Drain |
//! |------|---------------|-----------|-------|
//! | Normal | yes | `normal_max_in_flight` | `normal_drain_batch` |
//! | Economy | yes, deferred to the buffer when busy | `economy_max_in_flight` | `economy_drain_batch` |
//! | Emergency | no, events go to local storage only | 0 | paused |
//!
//! Leaving a degraded mode requires CPU below a lower threshold than the one
//! that entered it. Ingestion is never throttled; only delivery is.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tracing::{info, warn};

use rollcall_config::model::AdmissionConfig;
use rollcall_core::OperatingMode;

/// CPU percentages that drive mode transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Normal enters Economy at or above this value.
    pub economy: f64,
    /// Any mode enters Emergency at or above this value.
    pub emergency: f64,
    /// Emergency steps down to Economy below this value.
    pub emergency_exit: f64,
    /// Economy and Emergency return to Normal below this value.
    pub normal: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            economy: 70.0,
            emergency: 90.0,
            emergency_exit: 80.0,
            normal: 50.0,
        }
    }
}

impl Thresholds {
    /// Mode that follows `current` after observing `cpu`.
    pub fn next_mode(&self, current: OperatingMode, cpu: f64) -> OperatingMode {
        use OperatingMode::*;
        match current {
            Normal if cpu >= self.emergency => Emergency,
            Normal if cpu >= self.economy => Economy,
            Normal => Normal,
            Economy if cpu >= self.emergency => Emergency,
            Economy if cpu < self.normal => Normal,
            Economy => Economy,
            Emergency if cpu < self.normal => Normal,
            Emergency if cpu < self.emergency_exit => Economy,
            Emergency => Emergency,
        }
    }
}

/// What a mode allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    pub max_in_flight: usize,
    /// Pause after each live or drained delivery, taken while the slot is
    /// still held so the next delivery in this mode waits it out.
    pub delay: Duration,
    pub drain_batch: usize,
    pub live_delivery: bool,
}

#[derive(Debug, Clone, Copy)]
struct Profiles {
    normal: ModeProfile,
    economy: ModeProfile,
    emergency: ModeProfile,
}

/// Answer to a request for a live delivery slot.
#[derive(Debug)]
pub enum Admission {
    /// Deliver now; the slot is released when the permit drops.
    Granted(AdmissionPermit),
    /// Economy mode and every slot is taken: buffer the event.
    Deferred,
    /// Emergency mode: no delivery at all.
    Denied,
}

struct Shared {
    thresholds: Thresholds,
    profiles: Profiles,
    mode_tx: watch::Sender<OperatingMode>,
    in_flight: AtomicUsize,
    changed: Notify,
    last_cpu: Mutex<Option<f64>>,
}

/// Process-wide admission controller. Cheap to clone.
#[derive(Clone)]
pub struct AdmissionController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("mode", &self.mode())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl AdmissionController {
    pub fn from_config(config: &AdmissionConfig) -> Self {
        let thresholds = Thresholds {
            economy: config.economy_threshold,
            emergency: config.emergency_threshold,
            emergency_exit: config.emergency_exit_threshold,
            normal: config.normal_threshold,
        };
        let profiles = Profiles {
            normal: ModeProfile {
                max_in_flight: config.normal_max_in_flight.max(1),
                delay: Duration::from_millis(config.normal_delay_ms),
                drain_batch: config.normal_drain_batch,
                live_delivery: true,
            },
            economy: ModeProfile {
                max_in_flight: config.economy_max_in_flight.max(1),
                delay: Duration::from_millis(config.economy_delay_ms),
                drain_batch: config.economy_drain_batch,
                live_delivery: true,
            },
            emergency: ModeProfile {
                max_in_flight: 0,
                delay: Duration::ZERO,
                drain_batch: 0,
                live_delivery: false,
            },
        };
        Self::new(thresholds, profiles)
    }

    fn new(thresholds: Thresholds, profiles: Profiles) -> Self {
        let (mode_tx, _) = watch::channel(OperatingMode::Normal);
        Self {
            shared: Arc::new(Shared {
                thresholds,
                profiles,
                mode_tx,
                in_flight: AtomicUsize::new(0),
                changed: Notify::new(),
                last_cpu: Mutex::new(None),
            }),
        }
    }

    pub fn mode(&self) -> OperatingMode {
        *self.shared.mode_tx.borrow()
    }

    pub fn profile(&self, mode: OperatingMode) -> ModeProfile {
        match mode {
            OperatingMode::Normal => self.shared.profiles.normal,
            OperatingMode::Economy => self.shared.profiles.economy,
            OperatingMode::Emergency => self.shared.profiles.emergency,
        }
    }

    /// Profile of the current mode.
    pub fn current_profile(&self) -> ModeProfile {
        self.profile(self.mode())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.shared.thresholds
    }

    /// Live deliveries currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn last_cpu(&self) -> Option<f64> {
        self.shared.last_cpu.lock().ok().and_then(|guard| *guard)
    }

    /// Receiver notified on every mode change.
    pub fn subscribe(&self) -> watch::Receiver<OperatingMode> {
        self.shared.mode_tx.subscribe()
    }

    /// Feed one CPU sample. Returns the new mode when it changed.
    pub fn observe(&self, cpu_percent: f64) -> Option<OperatingMode> {
        if let Ok(mut last) = self.shared.last_cpu.lock() {
            *last = Some(cpu_percent);
        }
        rollcall_prometheus::set_cpu_percent(cpu_percent);

        let current = self.mode();
        let next = self.shared.thresholds.next_mode(current, cpu_percent);
        if next == current {
            return None;
        }

        self.shared.mode_tx.send_replace(next);
        rollcall_prometheus::set_operating_mode(next.as_gauge());
        match next {
            OperatingMode::Emergency => warn!(
                from = %current,
                to = %next,
                cpu = cpu_percent,
                "operating mode changed, live delivery suspended"
            ),
            _ => info!(from = %current, to = %next, cpu = cpu_percent, "operating mode changed"),
        }
        // Waiters re-evaluate against the new mode's limits.
        self.shared.changed.notify_waiters();
        Some(next)
    }

    /// Ask for a live delivery slot.
    ///
    /// In Normal mode this waits for a slot to free up; in Economy it defers
    /// instead of waiting; in Emergency it is always denied.
    pub async fn acquire(&self) -> Admission {
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let mode = self.mode();
            let profile = self.profile(mode);
            if !profile.live_delivery {
                return Admission::Denied;
            }
            if self.try_reserve(profile.max_in_flight) {
                return Admission::Granted(AdmissionPermit {
                    shared: self.shared.clone(),
                    mode,
                });
            }
            if mode == OperatingMode::Economy {
                return Admission::Deferred;
            }
            notified.await;
        }
    }

    fn try_reserve(&self, limit: usize) -> bool {
        self.shared
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }
}

/// A held live-delivery slot.
pub struct AdmissionPermit {
    shared: Arc<Shared>,
    mode: OperatingMode,
}

impl AdmissionPermit {
    /// Mode in effect when the slot was granted.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit").field("mode", &self.mode).finish()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.shared.changed.notify_waiters();
    }
}
