// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic retry of buffered events.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::service::PipelineService;

/// Drain the buffer every `interval` until cancelled.
///
/// A cycle that is still running when the next tick fires delays that tick;
/// cycles never overlap.
pub async fn run_drain_loop(
    service: Arc<PipelineService>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; startup replay already logged the backlog.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if service.drain_buffer().await.is_none() {
                    debug!("previous drain still running, skipping cycle");
                }
            }
            _ = cancel.cancelled() => {
                debug!("drain loop stopping");
                break;
            }
        }
    }
}
