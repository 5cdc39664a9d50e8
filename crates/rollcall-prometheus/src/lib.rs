// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for Rollcall.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The exporter can
//! serve its own scrape listener; Rollcall does no HTTP routing of its own.

pub mod recording;

use std::net::SocketAddr;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use rollcall_core::{AdapterType, HealthStatus, PluginAdapter, RollcallError};

pub use recording::{
    record_data_loss, record_delivery, record_error, record_event, record_rejected,
    register_metrics, set_buffer_len, set_cpu_percent, set_dedup_entries, set_operating_mode,
};

/// Installed Prometheus recorder.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
    listen: Option<SocketAddr>,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// With `listen` set, the exporter's scrape listener is spawned on the
    /// current tokio runtime. Only one recorder can be installed per process.
    pub fn install(listen: Option<SocketAddr>) -> Result<Self, RollcallError> {
        let handle = match listen {
            Some(addr) => {
                let (recorder, exporter) = PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .build()
                    .map_err(|e| {
                        RollcallError::Internal(format!("failed to build Prometheus exporter: {e}"))
                    })?;
                let handle = recorder.handle();
                metrics::set_global_recorder(recorder).map_err(|e| {
                    RollcallError::Internal(format!("failed to install Prometheus recorder: {e}"))
                })?;
                tokio::spawn(async move {
                    if let Err(e) = exporter.await {
                        tracing::error!(error = ?e, "prometheus exporter stopped");
                    }
                });
                handle
            }
            None => PrometheusBuilder::new().install_recorder().map_err(|e| {
                RollcallError::Internal(format!("failed to install Prometheus recorder: {e}"))
            })?,
        };

        recording::register_metrics();
        tracing::info!(listen = ?listen, "prometheus metrics recorder installed");

        Ok(Self { handle, listen })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RollcallError> {
        if let Some(addr) = self.listen {
            tracing::debug!(%addr, "prometheus exporter stops with the runtime");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global recorder can only be installed once per process, so these
    // tests record through a thread-local recorder instead.
    fn render_with<F: FnOnce()>(f: F) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn delivery_outcomes_are_labelled() {
        let text = render_with(|| {
            record_delivery("primary", 0.01);
            record_delivery("primary", 0.02);
            record_delivery("buffered", 0.5);
        });
        assert!(text.contains(r#"rollcall_deliveries_total{outcome="primary"} 2"#), "{text}");
        assert!(text.contains(r#"rollcall_deliveries_total{outcome="buffered"} 1"#), "{text}");
        assert!(text.contains("rollcall_delivery_latency_seconds"), "{text}");
    }

    #[test]
    fn gauges_take_the_last_value() {
        let text = render_with(|| {
            set_buffer_len(4);
            set_buffer_len(2);
            set_operating_mode(2.0);
        });
        assert!(text.contains("rollcall_buffer_len 2"), "{text}");
        assert!(text.contains("rollcall_operating_mode 2"), "{text}");
    }

    #[test]
    fn event_kinds_are_counted_separately() {
        let text = render_with(|| {
            record_event("JOIN");
            record_event("LEAVE");
            record_event("JOIN");
            record_data_loss();
        });
        assert!(text.contains(r#"rollcall_events_total{kind="JOIN"} 2"#), "{text}");
        assert!(text.contains("rollcall_data_loss_total 1"), "{text}");
    }
}
