// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory event store with scriptable failures.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use rollcall_core::{
    AdapterType, EventKey, EventStore, HealthStatus, InsertOutcome, MembershipEvent,
    PluginAdapter, RollcallError, StoreError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// A store that records every written event.
///
/// Failures come from two places: a one-shot script consumed in order, and
/// a persistent outage toggled with [`set_down`](Self::set_down).
pub struct MockStore {
    name: &'static str,
    idempotent: bool,
    rows: Mutex<Vec<MembershipEvent>>,
    keys: Mutex<HashSet<EventKey>>,
    script: Mutex<VecDeque<StoreError>>,
    outage: Mutex<Option<StoreError>>,
    calls: AtomicU32,
}

impl MockStore {
    fn with_semantics(name: &'static str, idempotent: bool) -> Self {
        Self {
            name,
            idempotent,
            rows: Mutex::new(Vec::new()),
            keys: Mutex::new(HashSet::new()),
            script: Mutex::new(VecDeque::new()),
            outage: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Store with a unique `event_key`, like the relational primary.
    pub fn idempotent(name: &'static str) -> Self {
        Self::with_semantics(name, true)
    }

    /// Store that appends every row, like the spreadsheet.
    pub fn append_only(name: &'static str) -> Self {
        Self::with_semantics(name, false)
    }

    /// The error a store returns when it cannot be reached.
    pub fn unreachable() -> StoreError {
        StoreError::Transient {
            message: "connection refused".to_string(),
        }
    }

    /// Fail the next `n` inserts with `err`.
    pub fn fail_next(&self, n: usize, err: StoreError) {
        let mut script = lock(&self.script);
        script.extend(std::iter::repeat_n(err, n));
    }

    /// Fail every insert with `err` until [`set_up`](Self::set_up).
    pub fn set_down(&self, err: StoreError) {
        *lock(&self.outage) = Some(err);
    }

    pub fn set_up(&self) {
        *lock(&self.outage) = None;
    }

    pub fn rows(&self) -> Vec<MembershipEvent> {
        lock(&self.rows).clone()
    }

    pub fn row_count(&self) -> usize {
        lock(&self.rows).len()
    }

    /// Insert calls received, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockStore {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        Ok(match lock(&self.outage).as_ref() {
            Some(err) => HealthStatus::Unhealthy(err.to_string()),
            None => HealthStatus::Healthy,
        })
    }

    async fn shutdown(&self) -> Result<(), RollcallError> {
        Ok(())
    }
}

#[async_trait]
impl EventStore for MockStore {
    async fn insert(&self, event: &MembershipEvent) -> Result<InsertOutcome, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.outage).clone() {
            return Err(err);
        }
        if let Some(err) = lock(&self.script).pop_front() {
            return Err(err);
        }
        if self.idempotent && !lock(&self.keys).insert(event.event_key.clone()) {
            return Ok(InsertOutcome::Duplicate);
        }
        lock(&self.rows).push(event.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn is_idempotent(&self) -> bool {
        self.idempotent
    }
}
