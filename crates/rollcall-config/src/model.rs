// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Rollcall.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Rollcall configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RollcallConfig {
    /// Bot identity and logging.
    #[serde(default)]
    pub bot: BotConfig,

    /// Primary store (SQLite) settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Secondary store (spreadsheet) settings.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Event buffer and journal settings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// In-memory dedup window.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Local durability log and emergency file.
    #[serde(default)]
    pub durability: DurabilityConfig,

    /// CPU-adaptive admission control.
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Live delivery retry policy for the primary store.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Name resolution retry policy.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Messaging bridge sidecar.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Periodic status snapshot file.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Bot identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name used in logs.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "rollcall".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Primary store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// How long SQLite waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Deadline for a single insert; expiry counts as a transient failure.
    #[serde(default = "default_insert_timeout_ms")]
    pub insert_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            insert_timeout_ms: default_insert_timeout_ms(),
        }
    }
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("rollcall").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

fn default_database_path() -> String {
    data_file("rollcall.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_insert_timeout_ms() -> u64 {
    10_000
}

/// Spreadsheet secondary store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsConfig {
    /// Enable the secondary store.
    #[serde(default)]
    pub enabled: bool,

    /// API base URL.
    #[serde(default = "default_sheets_base_url")]
    pub base_url: String,

    /// Target spreadsheet id. Required when enabled.
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// A1 range rows are appended to.
    #[serde(default = "default_sheets_range")]
    pub range: String,

    /// OAuth bearer token. Prefer `ROLLCALL_SHEETS_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_sheets_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_sheets_base_url(),
            spreadsheet_id: None,
            range: default_sheets_range(),
            access_token: None,
            timeout_secs: default_sheets_timeout_secs(),
        }
    }
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_sheets_range() -> String {
    "Registros!A:E".to_string()
}

fn default_sheets_timeout_secs() -> u64 {
    10
}

/// What the buffer does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the oldest pending event to the emergency file and accept the new one.
    #[default]
    EvictOldest,
    /// Keep the queue as is and send the new event to the emergency file.
    Reject,
}

/// Event buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Maximum number of pending events held in memory.
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,

    /// Drain attempts before an event is discarded as data loss.
    #[serde(default = "default_buffer_max_attempts")]
    pub max_attempts: u32,

    /// Path to the newline-delimited JSON journal.
    #[serde(default = "default_journal_path")]
    pub journal_path: String,

    /// Overflow behavior.
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Seconds between drain cycles.
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
            max_attempts: default_buffer_max_attempts(),
            journal_path: default_journal_path(),
            overflow: OverflowPolicy::default(),
            drain_interval_secs: default_drain_interval_secs(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_buffer_max_attempts() -> u32 {
    10
}

fn default_journal_path() -> String {
    data_file("buffer.jsonl")
}

fn default_drain_interval_secs() -> u64 {
    30
}

/// Dedup cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Seconds a delivered key is remembered.
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

fn default_dedup_ttl_secs() -> u64 {
    300
}

/// Local file sinks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DurabilityConfig {
    /// Append-only human-readable event log.
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// NDJSON file for events the buffer could not hold.
    #[serde(default = "default_emergency_path")]
    pub emergency_path: String,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            emergency_path: default_emergency_path(),
        }
    }
}

fn default_log_path() -> String {
    data_file("events.log")
}

fn default_emergency_path() -> String {
    data_file("emergency.jsonl")
}

/// CPU-adaptive admission control.
///
/// Thresholds are process CPU percentages normalized to 0-100 over all cores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Seconds between CPU samples.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Enter Economy at or above this value.
    #[serde(default = "default_economy_threshold")]
    pub economy_threshold: f64,

    /// Enter Emergency at or above this value.
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: f64,

    /// Emergency steps down to Economy below this value.
    #[serde(default = "default_emergency_exit_threshold")]
    pub emergency_exit_threshold: f64,

    /// Return to Normal below this value (low-water mark).
    #[serde(default = "default_normal_threshold")]
    pub normal_threshold: f64,

    #[serde(default = "default_normal_max_in_flight")]
    pub normal_max_in_flight: usize,

    #[serde(default = "default_economy_max_in_flight")]
    pub economy_max_in_flight: usize,

    /// Delay before each live delivery and between drained events in Normal.
    #[serde(default = "default_normal_delay_ms")]
    pub normal_delay_ms: u64,

    #[serde(default = "default_economy_delay_ms")]
    pub economy_delay_ms: u64,

    #[serde(default = "default_normal_drain_batch")]
    pub normal_drain_batch: usize,

    #[serde(default = "default_economy_drain_batch")]
    pub economy_drain_batch: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval_secs(),
            economy_threshold: default_economy_threshold(),
            emergency_threshold: default_emergency_threshold(),
            emergency_exit_threshold: default_emergency_exit_threshold(),
            normal_threshold: default_normal_threshold(),
            normal_max_in_flight: default_normal_max_in_flight(),
            economy_max_in_flight: default_economy_max_in_flight(),
            normal_delay_ms: default_normal_delay_ms(),
            economy_delay_ms: default_economy_delay_ms(),
            normal_drain_batch: default_normal_drain_batch(),
            economy_drain_batch: default_economy_drain_batch(),
        }
    }
}

fn default_sample_interval_secs() -> u64 {
    5
}

fn default_economy_threshold() -> f64 {
    70.0
}

fn default_emergency_threshold() -> f64 {
    90.0
}

fn default_emergency_exit_threshold() -> f64 {
    80.0
}

fn default_normal_threshold() -> f64 {
    50.0
}

fn default_normal_max_in_flight() -> usize {
    2
}

fn default_economy_max_in_flight() -> usize {
    1
}

fn default_normal_delay_ms() -> u64 {
    100
}

fn default_economy_delay_ms() -> u64 {
    2_000
}

fn default_normal_drain_batch() -> usize {
    10
}

fn default_economy_drain_batch() -> usize {
    3
}

/// Retry policy for live deliveries to the primary store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_delivery_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_delivery_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Retry policy for contact and chat name lookups.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between lookup attempts.
    #[serde(default = "default_resolver_backoff_ms")]
    pub backoff_ms: u64,

    /// Deadline for resolving both names of one event, retries included.
    /// The durability log line waits at most this long.
    #[serde(default = "default_resolver_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_resolver_max_attempts(),
            backoff_ms: default_resolver_backoff_ms(),
            timeout_ms: default_resolver_timeout_ms(),
        }
    }
}

fn default_resolver_max_attempts() -> u32 {
    3
}

fn default_resolver_backoff_ms() -> u64 {
    1_000
}

fn default_resolver_timeout_ms() -> u64 {
    5_000
}

/// Messaging bridge configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Command spawned to produce the NDJSON notification stream.
    /// Empty reads from stdin.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Exporter listen address. `None` installs the recorder without a listener.
    #[serde(default = "default_metrics_listen")]
    pub listen: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

fn default_metrics_listen() -> Option<String> {
    Some("127.0.0.1:9464".to_string())
}

/// Status snapshot file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StatusConfig {
    #[serde(default = "default_status_path")]
    pub path: String,

    #[serde(default = "default_status_interval_secs")]
    pub interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: default_status_path(),
            interval_secs: default_status_interval_secs(),
        }
    }
}

fn default_status_path() -> String {
    data_file("status.json")
}

fn default_status_interval_secs() -> u64 {
    15
}
