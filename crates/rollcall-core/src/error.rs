// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Rollcall.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The primary error type used across Rollcall adapters and core operations.
#[derive(Debug, Error)]
pub enum RollcallError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, migrations, connection loss).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Downstream store errors outside a single insert (client construction, health).
    #[error("store error: {message}")]
    Store {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local file errors on the journal, durability log, or emergency file.
    #[error("local file error on {}: {source}", path.display())]
    Journal {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Event source errors (bridge process, malformed stream, directory lookups).
    #[error("source error: {message}")]
    Source {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Requested adapter was not configured.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of a single insert against a downstream store.
///
/// Only [`StoreError::Transient`] and [`StoreError::Timeout`] are worth retrying;
/// the delivery pipeline falls back to the secondary store for every variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network, DNS, connection, or lock contention failure.
    #[error("transient store failure: {message}")]
    Transient { message: String },

    /// The store did not answer within the configured deadline.
    #[error("store call timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The target table or sheet is missing. Operator action required.
    #[error("store schema failure: {message}")]
    Schema { message: String },

    /// The store refused the record (bad request, auth failure).
    #[error("store rejected the record: {message}")]
    Rejected { message: String },
}

impl StoreError {
    /// Returns true when the same insert may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. } | StoreError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::Transient { message: "dns".into() }.is_transient());
        assert!(
            StoreError::Timeout {
                duration: Duration::from_secs(5)
            }
            .is_transient()
        );
        assert!(!StoreError::Schema { message: "no such table".into() }.is_transient());
        assert!(!StoreError::Rejected { message: "401".into() }.is_transient());
    }

    #[test]
    fn journal_error_names_the_path() {
        let err = RollcallError::Journal {
            path: PathBuf::from("/var/lib/rollcall/journal.jsonl"),
            source: std::io::Error::other("disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("journal.jsonl"), "got: {msg}");
        assert!(msg.contains("disk full"), "got: {msg}");
    }
}
