// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as threshold ordering, non-empty paths, and required credentials.

use crate::diagnostic::ConfigError;
use crate::model::RollcallConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RollcallConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::invalid(message));

    let paths = [
        ("storage.database_path", &config.storage.database_path),
        ("buffer.journal_path", &config.buffer.journal_path),
        ("durability.log_path", &config.durability.log_path),
        ("durability.emergency_path", &config.durability.emergency_path),
        ("status.path", &config.status.path),
    ];
    for (key, value) in paths {
        if value.trim().is_empty() {
            fail(format!("{key} must not be empty"));
        }
    }

    if config.buffer.capacity == 0 {
        fail("buffer.capacity must be greater than 0".to_string());
    }
    if config.buffer.max_attempts == 0 {
        fail("buffer.max_attempts must be at least 1".to_string());
    }
    if config.delivery.max_attempts == 0 {
        fail("delivery.max_attempts must be at least 1".to_string());
    }
    if config.resolver.max_attempts == 0 {
        fail("resolver.max_attempts must be at least 1".to_string());
    }
    if config.delivery.multiplier < 1.0 {
        fail(format!(
            "delivery.multiplier must be at least 1.0, got {}",
            config.delivery.multiplier
        ));
    }
    if config.delivery.initial_backoff_ms > config.delivery.max_backoff_ms {
        fail(format!(
            "delivery.initial_backoff_ms ({}) must not exceed delivery.max_backoff_ms ({})",
            config.delivery.initial_backoff_ms, config.delivery.max_backoff_ms
        ));
    }
    for (key, secs) in [
        ("buffer.drain_interval_secs", config.buffer.drain_interval_secs),
        ("admission.sample_interval_secs", config.admission.sample_interval_secs),
        ("status.interval_secs", config.status.interval_secs),
        ("storage.insert_timeout_ms", config.storage.insert_timeout_ms),
        ("sheets.timeout_secs", config.sheets.timeout_secs),
        ("resolver.timeout_ms", config.resolver.timeout_ms),
    ] {
        if secs == 0 {
            fail(format!("{key} must be greater than 0"));
        }
    }

    let a = &config.admission;
    for (key, value) in [
        ("admission.normal_threshold", a.normal_threshold),
        ("admission.economy_threshold", a.economy_threshold),
        ("admission.emergency_exit_threshold", a.emergency_exit_threshold),
        ("admission.emergency_threshold", a.emergency_threshold),
    ] {
        if !(0.0..=100.0).contains(&value) {
            fail(format!("{key} must be between 0 and 100, got {value}"));
        }
    }
    if !(a.normal_threshold < a.economy_threshold && a.economy_threshold < a.emergency_threshold) {
        fail(format!(
            "admission thresholds must satisfy normal ({}) < economy ({}) < emergency ({})",
            a.normal_threshold, a.economy_threshold, a.emergency_threshold
        ));
    }
    if !(a.normal_threshold < a.emergency_exit_threshold
        && a.emergency_exit_threshold <= a.emergency_threshold)
    {
        fail(format!(
            "admission thresholds must satisfy normal ({}) < emergency_exit ({}) <= emergency ({})",
            a.normal_threshold, a.emergency_exit_threshold, a.emergency_threshold
        ));
    }
    if a.normal_max_in_flight == 0 || a.economy_max_in_flight == 0 {
        fail("admission max_in_flight values must be at least 1".to_string());
    }
    if a.normal_drain_batch == 0 || a.economy_drain_batch == 0 {
        fail("admission drain_batch values must be at least 1".to_string());
    }

    if config.sheets.enabled {
        let missing_id = config
            .sheets
            .spreadsheet_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty());
        if missing_id {
            fail("sheets.spreadsheet_id is required when sheets.enabled = true".to_string());
        }
        if config.sheets.base_url.trim().is_empty() {
            fail("sheets.base_url must not be empty".to_string());
        }
    }

    if config.metrics.enabled {
        if let Some(listen) = &config.metrics.listen {
            if listen.parse::<std::net::SocketAddr>().is_err() {
                fail(format!("metrics.listen `{listen}` is not a valid socket address"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
