// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the EventStore trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use rollcall_config::model::StorageConfig;
use rollcall_core::{
    AdapterType, EventStore, HealthStatus, InsertOutcome, MembershipEvent, PluginAdapter,
    RollcallError, StoreError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed primary store.
///
/// The database is opened on [`SqliteEventStore::initialize`]; inserts before
/// that fail as transient so the pipeline falls back instead of losing events.
pub struct SqliteEventStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteEventStore {
    /// Create a store for the configured path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), RollcallError> {
        let db = Database::open(
            &self.config.database_path,
            Duration::from_millis(self.config.busy_timeout_ms),
        )
        .await?;
        self.db.set(db).map_err(|_| RollcallError::Storage {
            source: "primary store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "primary store initialized");
        Ok(())
    }

    /// The underlying database, if initialized.
    pub fn database(&self) -> Result<&Database, RollcallError> {
        self.db.get().ok_or_else(|| RollcallError::Storage {
            source: "primary store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteEventStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        let Ok(db) = self.database() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let check = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM whatsapp_events LIMIT 1", [], |row| {
                    row.get(0)
                })
            })
            .await;
        Ok(match check {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), RollcallError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, event: &MembershipEvent) -> Result<InsertOutcome, StoreError> {
        let db = self.db.get().ok_or_else(|| StoreError::Transient {
            message: "primary store not initialized".into(),
        })?;
        queries::events::insert_event(db, event).await
    }

    fn is_idempotent(&self) -> bool {
        true
    }
}
