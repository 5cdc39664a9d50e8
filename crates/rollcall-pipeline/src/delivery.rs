// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Primary-then-secondary delivery of a single event.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use rollcall_core::{EventStore, InsertOutcome, MembershipEvent, StoreError};
use rollcall_resilience::RetryPolicy;

/// Which store accepted the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(Sink),
    /// The primary store already had this key. Counts as success.
    DuplicateIgnored,
    /// Neither store took the event; carries the primary store's error.
    Failed(StoreError),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered(Sink::Primary) => "primary",
            DeliveryOutcome::Delivered(Sink::Secondary) => "secondary",
            DeliveryOutcome::DuplicateIgnored => "duplicate",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    /// Attempts spent on the primary store.
    pub primary_attempts: u32,
}

pub struct DeliveryPipeline {
    primary: Arc<dyn EventStore>,
    secondary: Option<Arc<dyn EventStore>>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl DeliveryPipeline {
    /// `timeout` bounds every single store call; expiry is a transient failure.
    pub fn new(
        primary: Arc<dyn EventStore>,
        secondary: Option<Arc<dyn EventStore>>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            policy,
            timeout,
        }
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Live delivery: retry the primary store under the configured policy.
    pub async fn deliver(&self, event: &MembershipEvent) -> DeliveryReport {
        self.deliver_with(&self.policy, event).await
    }

    /// Drain delivery: one primary attempt per cycle.
    pub async fn deliver_once(&self, event: &MembershipEvent) -> DeliveryReport {
        self.deliver_with(&RetryPolicy::none(), event).await
    }

    async fn deliver_with(&self, policy: &RetryPolicy, event: &MembershipEvent) -> DeliveryReport {
        let started = Instant::now();
        let primary = policy
            .run(
                |attempt| {
                    debug!(event_key = %event.event_key, attempt, store = self.primary.name(), "inserting");
                    insert_bounded(self.primary.as_ref(), event, self.timeout)
                },
                StoreError::is_transient,
            )
            .await;

        let outcome = match primary.result {
            Ok(InsertOutcome::Inserted) => DeliveryOutcome::Delivered(Sink::Primary),
            Ok(InsertOutcome::Duplicate) => {
                info!(event_key = %event.event_key, "duplicate event ignored by primary store");
                DeliveryOutcome::DuplicateIgnored
            }
            Err(primary_err) => {
                log_primary_failure(event, &primary_err, primary.attempts);
                self.fall_back(event, primary_err).await
            }
        };

        rollcall_prometheus::record_delivery(outcome.label(), started.elapsed().as_secs_f64());
        DeliveryReport {
            outcome,
            primary_attempts: primary.attempts,
        }
    }

    /// One secondary attempt, only when the primary could not be reached.
    ///
    /// Schema and rejection errors go straight back to the caller for
    /// buffering.
    async fn fall_back(&self, event: &MembershipEvent, primary_err: StoreError) -> DeliveryOutcome {
        let Some(secondary) = &self.secondary else {
            return DeliveryOutcome::Failed(primary_err);
        };
        if !primary_err.is_transient() {
            debug!(
                event_key = %event.event_key,
                error = %primary_err,
                "primary failure is not transient, skipping secondary store"
            );
            return DeliveryOutcome::Failed(primary_err);
        }
        match insert_bounded(secondary.as_ref(), event, self.timeout).await {
            Ok(_) => {
                info!(
                    event_key = %event.event_key,
                    store = secondary.name(),
                    "event delivered to secondary store"
                );
                DeliveryOutcome::Delivered(Sink::Secondary)
            }
            Err(e) => {
                warn!(
                    event_key = %event.event_key,
                    store = secondary.name(),
                    error = %e,
                    "secondary store failed"
                );
                rollcall_prometheus::record_error("secondary_store");
                DeliveryOutcome::Failed(primary_err)
            }
        }
    }
}

fn log_primary_failure(event: &MembershipEvent, err: &StoreError, attempts: u32) {
    rollcall_prometheus::record_error("primary_store");
    match err {
        StoreError::Schema { .. } => error!(
            event_key = %event.event_key,
            error = %err,
            "primary store schema is missing; operator action required"
        ),
        _ => warn!(
            event_key = %event.event_key,
            attempts,
            error = %err,
            "primary store failed"
        ),
    }
}

async fn insert_bounded(
    store: &dyn EventStore,
    event: &MembershipEvent,
    timeout: Duration,
) -> Result<InsertOutcome, StoreError> {
    match tokio::time::timeout(timeout, store.insert(event)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { duration: timeout }),
    }
}
