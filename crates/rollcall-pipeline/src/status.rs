// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator-facing counters and the periodically written status file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rollcall_core::{OperatingMode, RollcallError};

use crate::journal::write_atomically;
use crate::service::PipelineService;

/// Monotonic pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub(crate) received: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) fallback: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) buffered: AtomicU64,
    pub(crate) drained: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) emergency_writes: AtomicU64,
    pub(crate) errors: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub updated_at: DateTime<Utc>,
    pub mode: OperatingMode,
    pub cpu_percent: Option<f64>,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    pub in_flight: usize,
    pub dedup_entries: usize,
    pub received: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub fallback: u64,
    pub duplicates: u64,
    pub buffered: u64,
    pub drained: u64,
    pub discarded: u64,
    pub emergency_writes: u64,
    pub errors: u64,
}

impl PipelineStatus {
    pub(crate) fn from_parts(
        stats: &PipelineStats,
        mode: OperatingMode,
        cpu_percent: Option<f64>,
        buffer_len: usize,
        buffer_capacity: usize,
        in_flight: usize,
        dedup_entries: usize,
    ) -> Self {
        Self {
            updated_at: Utc::now(),
            mode,
            cpu_percent,
            buffer_len,
            buffer_capacity,
            in_flight,
            dedup_entries,
            received: PipelineStats::get(&stats.received),
            rejected: PipelineStats::get(&stats.rejected),
            delivered: PipelineStats::get(&stats.delivered),
            fallback: PipelineStats::get(&stats.fallback),
            duplicates: PipelineStats::get(&stats.duplicates),
            buffered: PipelineStats::get(&stats.buffered),
            drained: PipelineStats::get(&stats.drained),
            discarded: PipelineStats::get(&stats.discarded),
            emergency_writes: PipelineStats::get(&stats.emergency_writes),
            errors: PipelineStats::get(&stats.errors),
        }
    }
}

/// Atomically replace the status file with `status`.
pub fn write_status(path: &Path, status: &PipelineStatus) -> Result<(), RollcallError> {
    let json = serde_json::to_vec_pretty(status)
        .map_err(|e| RollcallError::Internal(format!("failed to encode status: {e}")))?;
    write_atomically(path, &json)
}

pub fn read_status(path: &Path) -> Result<PipelineStatus, RollcallError> {
    let bytes = std::fs::read(path).map_err(|source| RollcallError::Journal {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        RollcallError::Internal(format!("unreadable status file {}: {e}", path.display()))
    })
}

/// Write the status file every `interval` and once more on cancellation.
pub async fn run_status_writer(
    service: Arc<PipelineService>,
    path: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => {
                write_or_warn(&service, &path);
                debug!("status writer stopping");
                break;
            }
        }
        write_or_warn(&service, &path);
    }
}

fn write_or_warn(service: &PipelineService, path: &Path) {
    if let Err(e) = write_status(path, &service.status()) {
        warn!(error = %e, "failed to write status file");
    }
}
