// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` assembles a [`PipelineService`] over mock stores, a mock
//! directory, and local files in a temp directory. [`TestHarness::restart`]
//! rebuilds the service over the same files and stores to exercise journal
//! recovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollcall_config::model::{OverflowPolicy, RollcallConfig};
use rollcall_core::{ChatDirectory, EventStore, NotificationKind, RawNotification, RollcallError};
use rollcall_pipeline::{
    BufferedEvent, EmergencyRecord, PipelinePorts, PipelineService, read_emergency_records,
    read_entries,
};
use rollcall_resilience::AdmissionController;

use crate::mock_directory::MockDirectory;
use crate::mock_store::MockStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    secondary: bool,
    directory: bool,
    capacity: Option<usize>,
    max_attempts: Option<u32>,
    overflow: OverflowPolicy,
    mode_delay_ms: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            secondary: false,
            directory: true,
            capacity: None,
            max_attempts: None,
            overflow: OverflowPolicy::EvictOldest,
            mode_delay_ms: 0,
        }
    }

    /// Add an append-only secondary store.
    pub fn with_secondary(mut self) -> Self {
        self.secondary = true;
        self
    }

    /// Run without a name directory.
    pub fn without_directory(mut self) -> Self {
        self.directory = false;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Drain attempts before a buffered event is discarded.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Pacing delay after each delivery, in Normal and Economy alike.
    pub fn with_mode_delay_ms(mut self, delay_ms: u64) -> Self {
        self.mode_delay_ms = delay_ms;
        self
    }

    pub fn build(self) -> Result<TestHarness, RollcallError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RollcallError::Storage { source: e.into() })?;
        let config = self.config(temp_dir.path());

        let primary = Arc::new(MockStore::idempotent("mock-primary"));
        let secondary = self
            .secondary
            .then(|| Arc::new(MockStore::append_only("mock-secondary")));
        let directory = Arc::new(MockDirectory::new());
        let admission = AdmissionController::from_config(&config.admission);

        let service = open_service(
            &config,
            &primary,
            secondary.as_ref(),
            self.directory.then(|| directory.clone()),
            &admission,
        )?;

        Ok(TestHarness {
            service,
            primary,
            secondary,
            directory,
            use_directory: self.directory,
            admission,
            config,
            _temp_dir: temp_dir,
        })
    }

    fn config(&self, dir: &Path) -> RollcallConfig {
        let path = |name: &str| dir.join(name).display().to_string();
        let mut config = RollcallConfig::default();
        config.storage.database_path = path("rollcall.db");
        config.storage.insert_timeout_ms = 1_000;
        config.buffer.journal_path = path("buffer.jsonl");
        config.buffer.overflow = self.overflow;
        if let Some(capacity) = self.capacity {
            config.buffer.capacity = capacity;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.buffer.max_attempts = max_attempts;
        }
        config.durability.log_path = path("events.log");
        config.durability.emergency_path = path("emergency.jsonl");
        config.status.path = path("status.json");
        config.delivery.initial_backoff_ms = 10;
        config.delivery.max_backoff_ms = 40;
        config.resolver.backoff_ms = 10;
        config.admission.normal_delay_ms = self.mode_delay_ms;
        config.admission.economy_delay_ms = self.mode_delay_ms;
        config
    }
}

fn open_service(
    config: &RollcallConfig,
    primary: &Arc<MockStore>,
    secondary: Option<&Arc<MockStore>>,
    directory: Option<Arc<MockDirectory>>,
    admission: &AdmissionController,
) -> Result<Arc<PipelineService>, RollcallError> {
    let ports = PipelinePorts {
        primary: primary.clone() as Arc<dyn EventStore>,
        secondary: secondary.map(|s| s.clone() as Arc<dyn EventStore>),
        directory: directory.map(|d| d as Arc<dyn ChatDirectory>),
        admission: admission.clone(),
    };
    Ok(Arc::new(PipelineService::open(config, ports)?))
}

/// A raw notification for `recipients` in `chat_id`.
pub fn notification(chat_id: &str, recipients: &[&str], timestamp: Option<i64>) -> RawNotification {
    RawNotification {
        chat_id: Some(chat_id.to_string()),
        recipient_ids: recipients.iter().map(|r| (*r).to_string()).collect(),
        timestamp,
        id: None,
        author: None,
    }
}

/// A complete pipeline over mocks and temp files.
pub struct TestHarness {
    pub service: Arc<PipelineService>,
    pub primary: Arc<MockStore>,
    pub secondary: Option<Arc<MockStore>>,
    pub directory: Arc<MockDirectory>,
    use_directory: bool,
    pub admission: AdmissionController,
    pub config: RollcallConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Drop the service and open a new one over the same files and stores.
    pub fn restart(&mut self) -> Result<(), RollcallError> {
        self.service = open_service(
            &self.config,
            &self.primary,
            self.secondary.as_ref(),
            self.use_directory.then(|| self.directory.clone()),
            &self.admission,
        )?;
        Ok(())
    }

    /// Feed one notification through the service.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        chat_id: &str,
        recipients: &[&str],
        timestamp: Option<i64>,
    ) {
        self.service
            .handle(notification(chat_id, recipients, timestamp), kind)
            .await;
    }

    /// Hand one notification to a tracked task and return at once.
    pub fn dispatch(
        &self,
        kind: NotificationKind,
        chat_id: &str,
        recipients: &[&str],
        timestamp: Option<i64>,
    ) {
        self.service
            .dispatch(notification(chat_id, recipients, timestamp), kind);
    }

    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(&self.config.durability.log_path)
    }

    pub fn journal_path(&self) -> PathBuf {
        PathBuf::from(&self.config.buffer.journal_path)
    }

    pub fn status_path(&self) -> PathBuf {
        PathBuf::from(&self.config.status.path)
    }

    /// Lines of the durability log.
    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.log_path())
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn journal_entries(&self) -> Vec<BufferedEvent> {
        read_entries(&self.journal_path()).unwrap_or_default()
    }

    pub fn emergency_records(&self) -> Vec<EmergencyRecord> {
        read_emergency_records(Path::new(&self.config.durability.emergency_path))
            .unwrap_or_default()
    }
}
