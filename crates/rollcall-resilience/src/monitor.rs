// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process CPU sampling and the sampler loop feeding the admission controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rollcall_core::{ResourceMonitor, RollcallError};

use crate::admission::AdmissionController;

/// CPU usage of the current process, normalized to 0-100 over all cores.
pub struct SysinfoMonitor {
    system: Mutex<System>,
    pid: Pid,
    cores: f64,
}

impl SysinfoMonitor {
    pub fn new() -> Result<Self, RollcallError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| RollcallError::Internal(format!("cannot determine own pid: {e}")))?;
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f64;
        let monitor = Self {
            system: Mutex::new(System::new()),
            pid,
            cores,
        };
        // CPU usage is a delta between two refreshes; prime the first one.
        monitor.refresh()?;
        Ok(monitor)
    }

    fn refresh(&self) -> Result<f64, RollcallError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| RollcallError::Internal("cpu monitor lock poisoned".into()))?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        let process = system
            .process(self.pid)
            .ok_or_else(|| RollcallError::Internal("own process not found".into()))?;
        Ok(f64::from(process.cpu_usage()) / self.cores)
    }
}

impl ResourceMonitor for SysinfoMonitor {
    fn sample_cpu_percent(&self) -> Result<f64, RollcallError> {
        self.refresh().map(|cpu| cpu.clamp(0.0, 100.0))
    }
}

/// Sample `monitor` every `interval` and feed the controller until cancelled.
///
/// A failed sample leaves the current mode unchanged.
pub async fn run_sampler(
    monitor: Arc<dyn ResourceMonitor>,
    controller: AdmissionController,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match monitor.sample_cpu_percent() {
                    Ok(cpu) => {
                        debug!(cpu, "cpu sampled");
                        controller.observe(cpu);
                    }
                    Err(e) => warn!(error = %e, "cpu sample failed"),
                }
            }
            _ = cancel.cancelled() => {
                debug!("cpu sampler stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysinfo_monitor_samples_own_process() {
        let monitor = SysinfoMonitor::new().unwrap();
        let cpu = monitor.sample_cpu_percent().unwrap();
        assert!((0.0..=100.0).contains(&cpu), "got {cpu}");
    }
}
