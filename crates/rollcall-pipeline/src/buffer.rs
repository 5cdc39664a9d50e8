// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, journal-backed queue of events awaiting delivery.
//!
//! Memory and journal move in lockstep: every accepted event is appended to
//! the journal before `enqueue` returns, and every removal (ack, discard,
//! eviction) rewrites the journal from the in-memory state. Events handed out
//! by [`EventBuffer::drain`] stay in the journal until acked, so a crash
//! mid-delivery replays them on the next start.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use rollcall_config::model::{BufferConfig, OverflowPolicy};
use rollcall_core::{EventKey, MembershipEvent, RollcallError};

use crate::journal::Journal;

/// Lifecycle of a buffered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStatus {
    Buffered,
    Delivered,
    Discarded,
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedEvent {
    pub event: MembershipEvent,
    pub buffered_at: DateTime<Utc>,
    pub attempts: u32,
    pub status: BufferStatus,
}

impl BufferedEvent {
    pub fn key(&self) -> &EventKey {
        &self.event.event_key
    }
}

/// What happened to an event offered to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Journaled and queued.
    Accepted,
    /// The same key is already queued or being delivered.
    AlreadyQueued,
    /// Queued after evicting the oldest entry, which the caller must persist elsewhere.
    Evicted(Box<BufferedEvent>),
    /// Not queued; the caller must persist the event elsewhere.
    Rejected,
}

impl EnqueueOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, EnqueueOutcome::Rejected)
    }
}

/// Result of reporting a failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackOutcome {
    /// Back at the tail of the queue.
    Requeued { attempts: u32 },
    /// Attempts exhausted; removed from buffer and journal.
    Discarded(Box<BufferedEvent>),
    /// The key was not in flight.
    Unknown,
}

/// Summary of startup recovery.
#[derive(Debug, Default)]
pub struct Recovery {
    pub replayed: usize,
    /// Journal entries beyond capacity, oldest first. Not kept in the buffer.
    pub overflow: Vec<BufferedEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<BufferedEvent>,
    in_flight: HashMap<EventKey, BufferedEvent>,
}

impl Inner {
    fn len(&self) -> usize {
        self.queue.len() + self.in_flight.len()
    }

    fn contains(&self, key: &EventKey) -> bool {
        self.in_flight.contains_key(key) || self.queue.iter().any(|e| e.key() == key)
    }

    fn entries(&self) -> impl Iterator<Item = &BufferedEvent> {
        self.in_flight.values().chain(self.queue.iter())
    }
}

#[derive(Debug)]
pub struct EventBuffer {
    inner: Mutex<Inner>,
    journal: Journal,
    capacity: usize,
    max_attempts: u32,
    overflow: OverflowPolicy,
}

impl EventBuffer {
    /// Open the journal at `config.journal_path` and replay it.
    ///
    /// Replayed entries keep their attempt counts. Repeated keys collapse to
    /// the last occurrence; entries beyond capacity are returned in
    /// [`Recovery::overflow`]. The journal is then compacted to match memory.
    pub fn open(config: &BufferConfig) -> Result<(Self, Recovery), RollcallError> {
        let journal = Journal::open(&config.journal_path)?;
        let mut entries = journal.replay()?;
        entries.retain(|e| e.status == BufferStatus::Buffered);

        let mut queue: VecDeque<BufferedEvent> = VecDeque::with_capacity(entries.len());
        for entry in entries {
            if let Some(pos) = queue.iter().position(|e| e.key() == entry.key()) {
                queue.remove(pos);
            }
            queue.push_back(entry);
        }

        let capacity = config.capacity.max(1);
        let excess = queue.len().saturating_sub(capacity);
        let overflow: Vec<_> = queue.drain(..excess).collect();
        let replayed = queue.len();

        let buffer = Self {
            inner: Mutex::new(Inner {
                queue,
                in_flight: HashMap::new(),
            }),
            journal,
            capacity,
            max_attempts: config.max_attempts,
            overflow: config.overflow,
        };
        {
            let inner = buffer.lock();
            buffer.journal.rewrite(inner.entries())?;
        }
        rollcall_prometheus::set_buffer_len(replayed);

        if replayed > 0 || !overflow.is_empty() {
            info!(
                path = %buffer.journal.path().display(),
                replayed,
                overflow = overflow.len(),
                "buffer recovered from journal"
            );
        }
        Ok((buffer, Recovery { replayed, overflow }))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offer an event that could not be delivered.
    ///
    /// `attempts` is the number of delivery attempts already spent on it.
    /// Never fails: a journal write error turns into [`EnqueueOutcome::Rejected`].
    pub fn enqueue(&self, event: MembershipEvent, attempts: u32) -> EnqueueOutcome {
        let mut inner = self.lock();
        if inner.contains(&event.event_key) {
            debug!(event_key = %event.event_key, "event already buffered");
            return EnqueueOutcome::AlreadyQueued;
        }

        let entry = BufferedEvent {
            event,
            buffered_at: Utc::now(),
            attempts,
            status: BufferStatus::Buffered,
        };

        if inner.len() < self.capacity {
            if let Err(e) = self.journal.append(&entry) {
                error!(event_key = %entry.key(), error = %e, "journal append failed");
                return EnqueueOutcome::Rejected;
            }
            inner.queue.push_back(entry);
            rollcall_prometheus::set_buffer_len(inner.len());
            return EnqueueOutcome::Accepted;
        }

        if self.overflow == OverflowPolicy::Reject {
            warn!(capacity = self.capacity, event_key = %entry.key(), "buffer full, rejecting event");
            return EnqueueOutcome::Rejected;
        }
        let Some(evicted) = inner.queue.pop_front() else {
            // Everything is in flight; nothing may be evicted.
            warn!(capacity = self.capacity, event_key = %entry.key(), "buffer full of in-flight events");
            return EnqueueOutcome::Rejected;
        };

        inner.queue.push_back(entry);
        if let Err(e) = self.journal.rewrite(inner.entries()) {
            error!(error = %e, "journal rewrite failed, keeping previous contents");
            if let Some(entry) = inner.queue.pop_back() {
                debug!(event_key = %entry.key(), "new event not buffered");
            }
            inner.queue.push_front(evicted);
            return EnqueueOutcome::Rejected;
        }
        warn!(
            capacity = self.capacity,
            evicted = %evicted.key(),
            "buffer full, evicted oldest event"
        );
        EnqueueOutcome::Evicted(Box::new(evicted))
    }

    /// Hand out up to `batch_size` events from the head of the queue.
    ///
    /// Each one must come back through [`ack`](Self::ack),
    /// [`nack`](Self::nack), or [`release`](Self::release).
    pub fn drain(&self, batch_size: usize) -> Vec<BufferedEvent> {
        let mut inner = self.lock();
        let take = batch_size.min(inner.queue.len());
        let batch: Vec<_> = inner.queue.drain(..take).collect();
        for entry in &batch {
            inner.in_flight.insert(entry.key().clone(), entry.clone());
        }
        batch
    }

    /// Confirm delivery of an in-flight event and drop it from the journal.
    pub fn ack(&self, key: &EventKey) -> Result<bool, RollcallError> {
        let mut inner = self.lock();
        if inner.in_flight.remove(key).is_none() {
            return Ok(false);
        }
        rollcall_prometheus::set_buffer_len(inner.len());
        self.journal.rewrite(inner.entries())?;
        Ok(true)
    }

    /// Report a failed delivery of an in-flight event.
    pub fn nack(&self, key: &EventKey) -> Result<NackOutcome, RollcallError> {
        let mut inner = self.lock();
        let Some(mut entry) = inner.in_flight.remove(key) else {
            return Ok(NackOutcome::Unknown);
        };
        entry.attempts += 1;

        let outcome = if entry.attempts > self.max_attempts {
            entry.status = BufferStatus::Discarded;
            error!(
                event_key = %entry.key(),
                chat_id = %entry.event.chat_id,
                attempts = entry.attempts,
                "delivery attempts exhausted, event discarded"
            );
            rollcall_prometheus::record_data_loss();
            NackOutcome::Discarded(Box::new(entry))
        } else {
            let attempts = entry.attempts;
            inner.queue.push_back(entry);
            NackOutcome::Requeued { attempts }
        };
        rollcall_prometheus::set_buffer_len(inner.len());
        self.journal.rewrite(inner.entries())?;
        Ok(outcome)
    }

    /// Put an in-flight event back at the head without counting an attempt.
    pub fn release(&self, key: &EventKey) -> bool {
        let mut inner = self.lock();
        match inner.in_flight.remove(key) {
            Some(entry) => {
                inner.queue.push_front(entry);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.lock().contains(key)
    }

    /// Queued plus in-flight events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of every pending event, in-flight first.
    pub fn snapshot(&self) -> Vec<BufferedEvent> {
        self.lock().entries().cloned().collect()
    }

    /// Release spare queue capacity.
    pub fn shrink(&self) {
        let mut inner = self.lock();
        inner.queue.shrink_to_fit();
        inner.in_flight.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::read_entries;
    use crate::key::compute_key;
    use rollcall_core::EventKind;
    use std::path::Path;

    fn event(user: &str) -> MembershipEvent {
        MembershipEvent {
            chat_id: "G1".into(),
            user_id: user.into(),
            kind: EventKind::Join,
            timestamp_unix: 1_700_000_000,
            group_name: "G1".into(),
            user_name: user.into(),
            event_key: compute_key("G1", user, EventKind::Join, 1_700_000_000),
        }
    }

    fn config(dir: &Path, capacity: usize) -> BufferConfig {
        BufferConfig {
            capacity,
            max_attempts: 4,
            journal_path: dir.join("buffer.jsonl").display().to_string(),
            ..BufferConfig::default()
        }
    }

    fn journal_users(dir: &Path) -> Vec<String> {
        read_entries(&dir.join("buffer.jsonl"))
            .unwrap()
            .into_iter()
            .map(|e| e.event.user_id)
            .collect()
    }

    #[test]
    fn enqueue_journals_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, recovery) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
        assert_eq!(recovery.replayed, 0);

        assert_eq!(buffer.enqueue(event("U1"), 3), EnqueueOutcome::Accepted);
        assert_eq!(journal_users(dir.path()), ["U1"]);
        assert_eq!(buffer.snapshot()[0].attempts, 3);
    }

    #[test]
    fn same_key_is_not_queued_twice() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, _) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
        buffer.enqueue(event("U1"), 0);
        assert_eq!(buffer.enqueue(event("U1"), 0), EnqueueOutcome::AlreadyQueued);

        let batch = buffer.drain(1);
        assert_eq!(batch.len(), 1);
        assert_eq!(buffer.enqueue(event("U1"), 0), EnqueueOutcome::AlreadyQueued);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn overflow_evicts_oldest_in_lockstep() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, _) = EventBuffer::open(&config(dir.path(), 2)).unwrap();
        buffer.enqueue(event("U1"), 0);
        buffer.enqueue(event("U2"), 0);

        match buffer.enqueue(event("U3"), 0) {
            EnqueueOutcome::Evicted(old) => assert_eq!(old.event.user_id, "U1"),
            other => panic!("expected eviction, got {other:?}"),
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(journal_users(dir.path()), ["U2", "U3"]);
    }

    #[test]
    fn reject_policy_keeps_existing_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 1);
        cfg.overflow = OverflowPolicy::Reject;
        let (buffer, _) = EventBuffer::open(&cfg).unwrap();
        buffer.enqueue(event("U1"), 0);

        let outcome = buffer.enqueue(event("U2"), 0);
        assert_eq!(outcome, EnqueueOutcome::Rejected);
        assert!(!outcome.is_accepted());
        assert_eq!(journal_users(dir.path()), ["U1"]);
    }

    #[test]
    fn in_flight_events_are_never_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, _) = EventBuffer::open(&config(dir.path(), 1)).unwrap();
        buffer.enqueue(event("U1"), 0);
        let _batch = buffer.drain(1);
        assert_eq!(buffer.enqueue(event("U2"), 0), EnqueueOutcome::Rejected);
    }

    #[test]
    fn ack_removes_from_memory_and_journal() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, _) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
        buffer.enqueue(event("U1"), 0);
        buffer.enqueue(event("U2"), 0);

        let batch = buffer.drain(1);
        // In-flight entries stay journaled until acked.
        assert_eq!(journal_users(dir.path()).len(), 2);

        assert!(buffer.ack(batch[0].key()).unwrap());
        assert!(!buffer.ack(batch[0].key()).unwrap());
        assert_eq!(journal_users(dir.path()), ["U2"]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn nack_requeues_at_tail_then_discards() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, _) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
        buffer.enqueue(event("U1"), 3);
        buffer.enqueue(event("U2"), 0);

        let key = buffer.drain(1)[0].key().clone();
        assert_eq!(buffer.nack(&key).unwrap(), NackOutcome::Requeued { attempts: 4 });
        assert_eq!(journal_users(dir.path()), ["U2", "U1"]);

        buffer.drain(1);
        let again = buffer.drain(1);
        assert_eq!(again[0].key(), &key);
        match buffer.nack(&key).unwrap() {
            NackOutcome::Discarded(entry) => {
                assert_eq!(entry.attempts, 5);
                assert_eq!(entry.status, BufferStatus::Discarded);
            }
            other => panic!("expected discard, got {other:?}"),
        }
        assert!(!buffer.contains(&key));
        assert_eq!(journal_users(dir.path()), ["U2"]);
        assert_eq!(buffer.nack(&key).unwrap(), NackOutcome::Unknown);
    }

    #[test]
    fn release_returns_to_head_without_an_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let (buffer, _) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
        buffer.enqueue(event("U1"), 1);
        buffer.enqueue(event("U2"), 1);
        let batch = buffer.drain(2);
        assert!(buffer.release(batch[1].key()));
        assert!(buffer.release(batch[0].key()));

        let order: Vec<_> = buffer.drain(2).into_iter().map(|e| (e.event.user_id, e.attempts)).collect();
        assert_eq!(order, [("U1".to_owned(), 1), ("U2".to_owned(), 1)]);
    }

    #[test]
    fn restart_replays_pending_and_in_flight_events() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (buffer, _) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
            for user in ["U1", "U2", "U3"] {
                buffer.enqueue(event(user), 3);
            }
            let _in_flight = buffer.drain(1);
        }

        let (buffer, recovery) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
        assert_eq!(recovery.replayed, 3);
        assert!(recovery.overflow.is_empty());
        assert_eq!(buffer.len(), 3);
        assert!(buffer.snapshot().iter().all(|e| e.attempts == 3));
    }

    #[test]
    fn replay_beyond_capacity_reports_overflow() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (buffer, _) = EventBuffer::open(&config(dir.path(), 10)).unwrap();
            for user in ["U1", "U2", "U3"] {
                buffer.enqueue(event(user), 0);
            }
        }

        let (buffer, recovery) = EventBuffer::open(&config(dir.path(), 2)).unwrap();
        assert_eq!(recovery.replayed, 2);
        assert_eq!(recovery.overflow.len(), 1);
        assert_eq!(recovery.overflow[0].event.user_id, "U1");
        assert_eq!(buffer.len(), 2);
        assert_eq!(journal_users(dir.path()), ["U2", "U3"]);
    }
}
