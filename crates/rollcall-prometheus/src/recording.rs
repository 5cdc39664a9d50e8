// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Rollcall metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "rollcall_events_total",
        "Membership events accepted by the normalizer"
    );
    describe_counter!(
        "rollcall_deliveries_total",
        "Delivery outcomes by sink and result"
    );
    describe_counter!(
        "rollcall_rejected_total",
        "Notifications dropped as malformed"
    );
    describe_counter!(
        "rollcall_data_loss_total",
        "Events discarded after exhausting retries"
    );
    describe_counter!("rollcall_errors_total", "Pipeline errors by component");
    describe_gauge!("rollcall_buffer_len", "Events pending in the buffer");
    describe_gauge!(
        "rollcall_operating_mode",
        "Admission mode (0 normal, 1 economy, 2 emergency)"
    );
    describe_gauge!("rollcall_cpu_percent", "Last sampled process CPU percent");
    describe_gauge!("rollcall_dedup_entries", "Keys held by the dedup cache");
    describe_histogram!(
        "rollcall_delivery_latency_seconds",
        "Time from admission to a delivery outcome"
    );
}

/// Record an accepted membership event.
pub fn record_event(kind: &str) {
    metrics::counter!("rollcall_events_total", "kind" => kind.to_string()).increment(1);
}

/// Record a delivery outcome (`primary`, `secondary`, `duplicate`, `buffered`, `drained`).
pub fn record_delivery(outcome: &'static str, latency_seconds: f64) {
    metrics::counter!("rollcall_deliveries_total", "outcome" => outcome).increment(1);
    metrics::histogram!("rollcall_delivery_latency_seconds").record(latency_seconds);
}

pub fn record_rejected(reason: &'static str) {
    metrics::counter!("rollcall_rejected_total", "reason" => reason).increment(1);
}

pub fn record_data_loss() {
    metrics::counter!("rollcall_data_loss_total").increment(1);
}

pub fn record_error(component: &'static str) {
    metrics::counter!("rollcall_errors_total", "component" => component).increment(1);
}

pub fn set_buffer_len(len: usize) {
    metrics::gauge!("rollcall_buffer_len").set(len as f64);
}

pub fn set_operating_mode(code: f64) {
    metrics::gauge!("rollcall_operating_mode").set(code);
}

pub fn set_cpu_percent(percent: f64) {
    metrics::gauge!("rollcall_cpu_percent").set(percent);
}

pub fn set_dedup_entries(len: usize) {
    metrics::gauge!("rollcall_dedup_entries").set(len as f64);
}
