// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store adapter trait for downstream sinks (relational table, spreadsheet).

use async_trait::async_trait;

use crate::error::StoreError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InsertOutcome, MembershipEvent};

/// A downstream sink that durably records membership events.
#[async_trait]
pub trait EventStore: PluginAdapter {
    /// Writes one event.
    ///
    /// Idempotent stores report an existing `event_key` as
    /// [`InsertOutcome::Duplicate`]; append-only stores always report
    /// [`InsertOutcome::Inserted`].
    async fn insert(&self, event: &MembershipEvent) -> Result<InsertOutcome, StoreError>;

    /// Whether the store enforces uniqueness on `event_key`.
    fn is_idempotent(&self) -> bool;
}
