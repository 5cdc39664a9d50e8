// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spreadsheet implementation of the EventStore trait.

use async_trait::async_trait;
use tracing::debug;

use rollcall_config::model::SheetsConfig;
use rollcall_core::{
    AdapterType, EventKind, EventStore, HealthStatus, InsertOutcome, MembershipEvent,
    PluginAdapter, RollcallError, StoreError,
};

use crate::client::SheetsClient;

/// Secondary store appending one row per event.
pub struct SheetsEventStore {
    client: SheetsClient,
}

impl SheetsEventStore {
    pub fn new(config: &SheetsConfig) -> Result<Self, RollcallError> {
        Ok(Self {
            client: SheetsClient::new(config)?,
        })
    }

    pub fn from_client(client: SheetsClient) -> Self {
        Self { client }
    }
}

/// Row layout: timestamp, user, group, join marker, leave marker.
pub fn row_for(event: &MembershipEvent) -> Vec<String> {
    let mark = |kind: EventKind| {
        if event.kind == kind {
            "X".to_string()
        } else {
            String::new()
        }
    };
    vec![
        event.display_timestamp(),
        event.user_name.clone(),
        event.group_name.clone(),
        mark(EventKind::Join),
        mark(EventKind::Leave),
    ]
}

#[async_trait]
impl PluginAdapter for SheetsEventStore {
    fn name(&self) -> &str {
        "sheets"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RollcallError> {
        Ok(())
    }
}

#[async_trait]
impl EventStore for SheetsEventStore {
    async fn insert(&self, event: &MembershipEvent) -> Result<InsertOutcome, StoreError> {
        let response = self.client.append_rows(vec![row_for(event)]).await?;
        debug!(
            event_key = %event.event_key,
            range = response.updates.and_then(|u| u.updated_range).as_deref().unwrap_or("-"),
            "row appended"
        );
        Ok(InsertOutcome::Inserted)
    }

    fn is_idempotent(&self) -> bool {
        false
    }
}
