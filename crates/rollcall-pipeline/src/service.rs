// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pipeline service: one instance per process, shared by handle.
//!
//! Every event takes the same path regardless of operating mode:
//! normalize, resolve names (bounded by a deadline), append to the durability
//! log, then either deliver live (when admitted) or buffer. Nothing is dropped
//! before the durability log write.
//!
//! Sources hand notifications to [`PipelineService::dispatcher`], which runs
//! each one on a tracked task so intake never waits on delivery. Shutdown
//! waits for those tasks; any still delivering when the grace period ends are
//! cut short and their events buffered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use rollcall_config::model::RollcallConfig;
use rollcall_core::{
    ChatDirectory, EventKey, EventStore, MembershipEvent, MembershipEventHandler, NotificationKind,
    OperatingMode, RawNotification, RollcallError, StoreError,
};
use rollcall_resilience::{Admission, AdmissionController, AdmissionPermit, RetryPolicy};

use crate::buffer::{EnqueueOutcome, EventBuffer, NackOutcome};
use crate::dedup::DedupCache;
use crate::delivery::{DeliveryOutcome, DeliveryPipeline, Sink};
use crate::durability::{DurabilityLog, EmergencyFile};
use crate::normalize::normalize;
use crate::resolver::NameResolver;
use crate::status::{PipelineStats, PipelineStatus};

/// Adapters the service is wired to.
pub struct PipelinePorts {
    pub primary: Arc<dyn EventStore>,
    pub secondary: Option<Arc<dyn EventStore>>,
    pub directory: Option<Arc<dyn ChatDirectory>>,
    pub admission: AdmissionController,
}

/// Result of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub requeued: usize,
    pub discarded: usize,
    /// Handed back untouched because admission stopped the cycle.
    pub released: usize,
}

pub struct PipelineService {
    resolver: NameResolver,
    delivery: DeliveryPipeline,
    buffer: EventBuffer,
    dedup: DedupCache,
    log: DurabilityLog,
    emergency: EmergencyFile,
    admission: AdmissionController,
    stats: PipelineStats,
    handlers: TaskTracker,
    abort: CancellationToken,
    drain_guard: AsyncMutex<()>,
}

impl PipelineService {
    /// Open the local files, replay the journal, and wire the adapters.
    ///
    /// Journal entries that no longer fit the buffer go to the emergency file.
    pub fn open(config: &RollcallConfig, ports: PipelinePorts) -> Result<Self, RollcallError> {
        let log = DurabilityLog::open(&config.durability.log_path)?;
        let emergency = EmergencyFile::open(&config.durability.emergency_path)?;
        let (buffer, recovery) = EventBuffer::open(&config.buffer)?;

        let service = Self {
            resolver: NameResolver::new(
                ports.directory,
                RetryPolicy::from_resolver_config(&config.resolver),
            )
            .with_deadline(Duration::from_millis(config.resolver.timeout_ms)),
            delivery: DeliveryPipeline::new(
                ports.primary,
                ports.secondary,
                RetryPolicy::from_delivery_config(&config.delivery).with_jitter(0.1),
                Duration::from_millis(config.storage.insert_timeout_ms),
            ),
            buffer,
            dedup: DedupCache::new(Duration::from_secs(config.dedup.ttl_secs)),
            log,
            emergency,
            admission: ports.admission,
            stats: PipelineStats::default(),
            handlers: TaskTracker::new(),
            abort: CancellationToken::new(),
            drain_guard: AsyncMutex::new(()),
        };

        for entry in &recovery.overflow {
            service.escalate(&entry.event, entry.attempts, "journal entry beyond buffer capacity");
        }
        info!(
            replayed = recovery.replayed,
            capacity = service.buffer.capacity(),
            secondary = service.delivery.has_secondary(),
            "pipeline service ready"
        );
        Ok(service)
    }

    /// Process one raw notification end to end. Never fails.
    pub async fn handle(&self, raw: RawNotification, kind: NotificationKind) {
        let _handler = self.handlers.token();

        let events = match normalize(&raw, kind, Utc::now().timestamp()) {
            Ok(events) => events,
            Err(rejection) => {
                warn!(
                    reason = rejection.reason(),
                    chat_id = ?raw.chat_id,
                    "notification dropped: {rejection}"
                );
                PipelineStats::bump(&self.stats.rejected);
                rollcall_prometheus::record_rejected(rejection.reason());
                return;
            }
        };

        for event in events {
            self.process(event).await;
        }
    }

    /// Run [`handle`](Self::handle) on a tracked task and return at once.
    pub fn dispatch(self: &Arc<Self>, raw: RawNotification, kind: NotificationKind) {
        let service = Arc::clone(self);
        self.handlers.spawn(async move { service.handle(raw, kind).await });
    }

    /// Handler for event sources: every notification is dispatched, so the
    /// source keeps reading while earlier events are still delivering.
    pub fn dispatcher(self: &Arc<Self>) -> Arc<dyn MembershipEventHandler> {
        Arc::new(Dispatcher(Arc::clone(self)))
    }

    async fn process(&self, event: MembershipEvent) {
        PipelineStats::bump(&self.stats.received);
        rollcall_prometheus::record_event(&event.kind.to_string());

        let event = self.with_names(event).await;

        if let Err(e) = self.log.append_event(&event) {
            error!(event_key = %event.event_key, error = %e, "durability log write failed");
            self.count_error("durability_log");
            self.escalate(&event, 0, "durability log write failed");
        }

        if self.dedup.has(&event.event_key) {
            debug!(event_key = %event.event_key, "recently delivered, skipping");
            PipelineStats::bump(&self.stats.duplicates);
            return;
        }
        if self.buffer.contains(&event.event_key) {
            debug!(event_key = %event.event_key, "already buffered, skipping");
            return;
        }

        let settled = tokio::select! {
            biased;
            permit = self.deliver_live(&event) => Some(permit),
            () = self.abort.cancelled() => None,
        };
        match settled {
            Some(Some(permit)) => self.pace(permit).await,
            Some(None) => {}
            None => {
                warn!(event_key = %event.event_key, "shutdown cut delivery short, buffering");
                self.buffer_event(&event, 0);
            }
        }
    }

    /// Deliver now if admitted, otherwise buffer. Returns the slot still
    /// held after a live attempt.
    async fn deliver_live(&self, event: &MembershipEvent) -> Option<AdmissionPermit> {
        match self.admission.acquire().await {
            Admission::Granted(permit) => {
                let report = self.delivery.deliver(event).await;
                match report.outcome {
                    DeliveryOutcome::Failed(err) => {
                        self.record_failure(event, &err);
                        self.buffer_event(event, report.primary_attempts);
                    }
                    outcome => self.record_success(event, &outcome),
                }
                Some(permit)
            }
            Admission::Deferred => {
                debug!(event_key = %event.event_key, "delivery slots busy, buffering");
                self.buffer_event(event, 0);
                None
            }
            Admission::Denied => {
                debug!(event_key = %event.event_key, "live delivery suspended, buffering");
                self.buffer_event(event, 0);
                None
            }
        }
    }

    /// Hold the slot through the mode's pacing delay.
    async fn pace(&self, permit: AdmissionPermit) {
        let delay = self.admission.profile(permit.mode()).delay;
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = self.abort.cancelled() => {}
        }
    }

    /// Fill in display names. Emergency mode keeps the formatted ids.
    async fn with_names(&self, mut event: MembershipEvent) -> MembershipEvent {
        if self.admission.mode() == OperatingMode::Emergency {
            return event;
        }
        let (user_name, group_name) = self.resolver.resolve(&event.user_id, &event.chat_id).await;
        event.user_name = user_name;
        event.group_name = group_name;
        event
    }

    fn record_success(&self, event: &MembershipEvent, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered(Sink::Primary) => {
                PipelineStats::bump(&self.stats.delivered)
            }
            DeliveryOutcome::Delivered(Sink::Secondary) => {
                PipelineStats::bump(&self.stats.fallback)
            }
            DeliveryOutcome::DuplicateIgnored => PipelineStats::bump(&self.stats.duplicates),
            DeliveryOutcome::Failed(_) => return,
        }
        self.dedup.remember(event.event_key.clone());
    }

    fn record_failure(&self, event: &MembershipEvent, err: &StoreError) {
        PipelineStats::bump(&self.stats.errors);
        let what = match err {
            StoreError::Schema { .. } => "schema failure",
            StoreError::Rejected { .. } => "rejected insert",
            _ => return,
        };
        self.log_error_line(&format!(
            "primary store {what} for event {}: {err}",
            event.event_key
        ));
    }

    /// Write an operator-facing error line to the durability log.
    fn log_error_line(&self, message: &str) {
        if let Err(e) = self.log.append_error(message) {
            error!(error = %e, line = message, "failed to write error line to durability log");
            self.count_error("durability_log");
        }
    }

    fn buffer_event(&self, event: &MembershipEvent, attempts: u32) {
        let key = &event.event_key;
        match self.buffer.enqueue(event.clone(), attempts) {
            EnqueueOutcome::Accepted => {
                PipelineStats::bump(&self.stats.buffered);
                info!(
                    event_key = %key,
                    attempts,
                    buffer_len = self.buffer.len(),
                    "event buffered"
                );
            }
            EnqueueOutcome::AlreadyQueued => {}
            EnqueueOutcome::Evicted(old) => {
                PipelineStats::bump(&self.stats.buffered);
                self.escalate(&old.event, old.attempts, "evicted from full buffer");
            }
            EnqueueOutcome::Rejected => {
                self.escalate(event, attempts, "buffer could not accept event")
            }
        }
    }

    /// Last-resort local write for events the buffer cannot hold.
    fn escalate(&self, event: &MembershipEvent, attempts: u32, reason: &str) {
        PipelineStats::bump(&self.stats.emergency_writes);
        match self.emergency.write(event, attempts, reason) {
            Ok(()) => warn!(
                event_key = %event.event_key,
                path = %self.emergency.path().display(),
                reason,
                "event written to emergency file"
            ),
            Err(e) => {
                error!(
                    event_key = %event.event_key,
                    error = %e,
                    reason,
                    "emergency write failed, event lost"
                );
                self.count_error("emergency_file");
                rollcall_prometheus::record_data_loss();
                self.log_error_line(&format!("event {} lost: {reason}: {e}", event.event_key));
            }
        }
    }

    fn count_error(&self, component: &'static str) {
        PipelineStats::bump(&self.stats.errors);
        rollcall_prometheus::record_error(component);
    }

    /// Retry buffered events once each, paced by the current mode.
    ///
    /// Returns `None` when another drain is already running.
    pub async fn drain_buffer(&self) -> Option<DrainReport> {
        let _guard = self.drain_guard.try_lock().ok()?;
        let mut report = DrainReport::default();

        let profile = self.admission.current_profile();
        if !profile.live_delivery || self.buffer.is_empty() {
            return Some(report);
        }

        let batch = self.buffer.drain(profile.drain_batch.max(1));
        let mut pending = batch.iter();
        while let Some(entry) = pending.next() {
            let key = entry.key();
            if self.dedup.has(key) {
                self.ack(key);
                report.delivered += 1;
                continue;
            }

            let permit = match self.admission.acquire().await {
                Admission::Granted(permit) => permit,
                Admission::Deferred | Admission::Denied => {
                    let unsent: Vec<_> = std::iter::once(key)
                        .chain(pending.by_ref().map(|rest| rest.key()))
                        .collect();
                    // Back to the head in their original order.
                    for key in unsent.into_iter().rev() {
                        self.buffer.release(key);
                        report.released += 1;
                    }
                    break;
                }
            };

            let outcome = self.delivery.deliver_once(&entry.event).await.outcome;
            match outcome {
                DeliveryOutcome::Failed(err) => {
                    self.record_failure(&entry.event, &err);
                    match self.buffer.nack(key) {
                        Ok(NackOutcome::Requeued { attempts }) => {
                            debug!(event_key = %key, attempts, "drain attempt failed, requeued");
                            report.requeued += 1;
                        }
                        Ok(NackOutcome::Discarded(lost)) => {
                            PipelineStats::bump(&self.stats.discarded);
                            report.discarded += 1;
                            self.log_error_line(&format!(
                                "event {} discarded after {} attempts: {} {} in {}",
                                lost.key(),
                                lost.attempts,
                                lost.event.kind,
                                lost.event.user_name,
                                lost.event.group_name
                            ));
                        }
                        Ok(NackOutcome::Unknown) => {}
                        Err(e) => {
                            error!(
                                event_key = %key,
                                error = %e,
                                "journal rewrite after failed drain attempt"
                            );
                            self.count_error("journal");
                        }
                    }
                }
                outcome => {
                    self.record_success(&entry.event, &outcome);
                    PipelineStats::bump(&self.stats.drained);
                    self.ack(key);
                    report.delivered += 1;
                }
            }

            let delay = self.admission.profile(permit.mode()).delay;
            drop(permit);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if report != DrainReport::default() {
            info!(
                delivered = report.delivered,
                requeued = report.requeued,
                discarded = report.discarded,
                released = report.released,
                remaining = self.buffer.len(),
                "drain cycle finished"
            );
        }
        Some(report)
    }

    fn ack(&self, key: &EventKey) {
        if let Err(e) = self.buffer.ack(key) {
            error!(event_key = %key, error = %e, "journal rewrite after delivery failed");
            self.count_error("journal");
        }
    }

    /// Free cache memory. Run when the process enters Emergency mode.
    pub fn reclaim(&self) {
        let purged = self.dedup.purge_expired();
        self.buffer.shrink();
        info!(purged, dedup_entries = self.dedup.len(), "memory reclaimed");
    }

    /// Run [`reclaim`](Self::reclaim) on every transition into Emergency mode.
    pub async fn run_reclaimer(self: Arc<Self>, cancel: CancellationToken) {
        let mut modes = self.admission.subscribe();
        loop {
            tokio::select! {
                changed = modes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *modes.borrow_and_update() == OperatingMode::Emergency {
                        self.reclaim();
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }

    /// Wait up to `grace` for running handlers, then try one last drain.
    ///
    /// Handlers still delivering after `grace` stop waiting on the stores and
    /// buffer their events instead.
    pub async fn shutdown(&self, grace: Duration) {
        self.handlers.close();
        if tokio::time::timeout(grace, self.handlers.wait()).await.is_err() {
            warn!(
                remaining = self.handlers.len(),
                "handlers still running after grace period, buffering their events"
            );
            self.abort.cancel();
            self.handlers.wait().await;
        }
        if let Some(report) = self.drain_buffer().await {
            debug!(?report, "final drain");
        }
        info!(buffer_len = self.buffer.len(), "pipeline stopped");
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus::from_parts(
            &self.stats,
            self.admission.mode(),
            self.admission.last_cpu(),
            self.buffer.len(),
            self.buffer.capacity(),
            self.admission.in_flight(),
            self.dedup.len(),
        )
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }
}

#[async_trait]
impl MembershipEventHandler for PipelineService {
    async fn on_group_join(&self, notification: RawNotification) {
        self.handle(notification, NotificationKind::Join).await;
    }

    async fn on_group_leave(&self, notification: RawNotification) {
        self.handle(notification, NotificationKind::Leave).await;
    }

    async fn on_group_remove(&self, notification: RawNotification) {
        self.handle(notification, NotificationKind::Remove).await;
    }
}

/// [`MembershipEventHandler`] that hands each notification to its own task.
struct Dispatcher(Arc<PipelineService>);

#[async_trait]
impl MembershipEventHandler for Dispatcher {
    async fn on_group_join(&self, notification: RawNotification) {
        self.0.dispatch(notification, NotificationKind::Join);
    }

    async fn on_group_leave(&self, notification: RawNotification) {
        self.0.dispatch(notification, NotificationKind::Leave);
    }

    async fn on_group_remove(&self, notification: RawNotification) {
        self.0.dispatch(notification, NotificationKind::Remove);
    }
}
