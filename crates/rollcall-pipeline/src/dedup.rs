// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived memory of recently delivered event keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use rollcall_core::EventKey;

/// Keys confirmed as durably delivered, each forgotten after its TTL.
///
/// [`remember`](Self::remember) uses the TTL fixed at construction;
/// [`remember_for`](Self::remember_for) takes one per call. Expiry is
/// enforced twice: a scheduled removal task keeps the map small, and lookups
/// ignore entries past their deadline in case no runtime was available to
/// schedule the removal.
#[derive(Debug, Clone)]
pub struct DedupCache {
    entries: Arc<Mutex<HashMap<EventKey, Instant>>>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Default TTL used by [`remember`](Self::remember).
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKey, Instant>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `key` was remembered and has not expired yet.
    pub fn has(&self, key: &EventKey) -> bool {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(deadline) if Instant::now() < *deadline => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Record a confirmed delivery for the default TTL.
    pub fn remember(&self, key: EventKey) {
        self.remember_for(key, self.ttl);
    }

    /// Record a confirmed delivery for `ttl` and schedule its removal.
    pub fn remember_for(&self, key: EventKey, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        self.lock().insert(key.clone(), deadline);
        rollcall_prometheus::set_dedup_entries(self.len());

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let entries = Arc::clone(&self.entries);
            handle.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let mut map = entries.lock().unwrap_or_else(|p| p.into_inner());
                // A later `remember` of the same key owns the entry now.
                if map.get(&key) == Some(&deadline) {
                    map.remove(&key);
                }
                rollcall_prometheus::set_dedup_entries(map.len());
            });
        }
    }

    pub fn forget(&self, key: &EventKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries and release spare capacity. Returns how many
    /// entries were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, deadline| now < *deadline);
        entries.shrink_to_fit();
        before - entries.len()
    }
}
