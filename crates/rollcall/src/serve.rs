// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rollcall serve` command implementation.
//!
//! Opens the stores, replays the local buffer, and feeds the bridge stream
//! through the pipeline while the CPU sampler, drain loop, status writer and
//! reclaimer run alongside. Everything stops on the first SIGINT/SIGTERM or
//! when the bridge stream ends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rollcall_config::model::RollcallConfig;
use rollcall_core::{ChatDirectory, EventStore, MembershipEventSource, PluginAdapter, RollcallError};
use rollcall_pipeline::{
    PipelinePorts, PipelineService, run_drain_loop, run_status_writer, write_status,
};
use rollcall_resilience::{AdmissionController, SysinfoMonitor, run_sampler};
use rollcall_storage::SqliteEventStore;
use rollcall_whatsapp::BridgeSource;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// How long in-flight handlers get after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runs the `rollcall serve` command.
pub async fn run_serve(config: RollcallConfig) -> Result<(), RollcallError> {
    init_tracing(&config.bot.log_level);

    info!(name = %config.bot.name, "starting rollcall serve");

    #[cfg(feature = "prometheus")]
    let _prometheus = init_metrics(&config);

    let primary = Arc::new(SqliteEventStore::new(config.storage.clone()));
    primary.initialize().await?;
    info!(path = %config.storage.database_path, "primary store ready");

    let secondary = open_secondary(&config)?;

    let source = BridgeSource::new(config.bridge.clone());
    let admission = AdmissionController::from_config(&config.admission);

    let ports = PipelinePorts {
        primary: primary.clone() as Arc<dyn EventStore>,
        secondary: secondary.clone(),
        directory: Some(source.directory() as Arc<dyn ChatDirectory>),
        admission: admission.clone(),
    };
    let service = Arc::new(PipelineService::open(&config, ports)?);
    info!(
        buffered = service.buffer().len(),
        capacity = service.buffer().capacity(),
        mode = %admission.mode(),
        "pipeline ready"
    );

    let cancel = install_signal_handler();
    let tasks = TaskTracker::new();

    match SysinfoMonitor::new() {
        Ok(monitor) => {
            tasks.spawn(run_sampler(
                Arc::new(monitor),
                admission.clone(),
                Duration::from_secs(config.admission.sample_interval_secs),
                cancel.clone(),
            ));
        }
        Err(e) => warn!(error = %e, "cpu monitor unavailable, staying in normal mode"),
    }
    tasks.spawn(run_drain_loop(
        service.clone(),
        Duration::from_secs(config.buffer.drain_interval_secs),
        cancel.clone(),
    ));
    tasks.spawn(run_status_writer(
        service.clone(),
        PathBuf::from(&config.status.path),
        Duration::from_secs(config.status.interval_secs),
        cancel.clone(),
    ));
    tasks.spawn(service.clone().run_reclaimer(cancel.clone()));
    tasks.close();

    // Dropping the source future on a signal only stops reading; each
    // notification already runs on a task the service tracks.
    let handler = service.dispatcher();
    tokio::select! {
        result = source.run(handler) => match result {
            Ok(()) => info!("bridge stream ended, shutting down"),
            Err(e) => error!(error = %e, "bridge source failed, shutting down"),
        },
        _ = cancel.cancelled() => debug!("stopping intake"),
    }
    cancel.cancel();

    service.shutdown(SHUTDOWN_GRACE).await;
    tasks.wait().await;

    if let Err(e) = write_status(&PathBuf::from(&config.status.path), &service.status()) {
        warn!(error = %e, "failed to write final status");
    }
    if let Err(e) = source.shutdown().await {
        warn!(error = %e, "bridge source shutdown failed");
    }
    if let Some(secondary) = &secondary {
        if let Err(e) = secondary.shutdown().await {
            warn!(error = %e, "secondary store shutdown failed");
        }
    }
    primary.shutdown().await?;

    info!("rollcall stopped");
    Ok(())
}

#[cfg(feature = "sheets")]
fn open_secondary(config: &RollcallConfig) -> Result<Option<Arc<dyn EventStore>>, RollcallError> {
    if !config.sheets.enabled {
        info!("secondary store disabled by configuration");
        return Ok(None);
    }
    let store = rollcall_sheets::SheetsEventStore::new(&config.sheets)?;
    info!("spreadsheet secondary store enabled");
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "sheets"))]
fn open_secondary(config: &RollcallConfig) -> Result<Option<Arc<dyn EventStore>>, RollcallError> {
    if config.sheets.enabled {
        warn!("sheets.enabled is set but the sheets feature is not compiled in");
    }
    Ok(None)
}

#[cfg(feature = "prometheus")]
fn init_metrics(config: &RollcallConfig) -> Option<rollcall_prometheus::PrometheusAdapter> {
    if !config.metrics.enabled {
        debug!("prometheus metrics disabled by configuration");
        return None;
    }
    let listen: Option<std::net::SocketAddr> =
        match config.metrics.listen.as_deref().map(str::parse).transpose() {
            Ok(listen) => listen,
            Err(e) => {
                warn!(error = %e, "invalid metrics.listen, continuing without metrics");
                return None;
            }
        };
    match rollcall_prometheus::PrometheusAdapter::install(listen) {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// The first signal cancels the returned token; a second one exits the
/// process without waiting for the drain.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested, finishing in-flight events (signal again to force)");
        token_clone.cancel();

        wait_for_signal().await;
        warn!("second signal received, exiting immediately");
        std::process::exit(130);
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => debug!("received SIGINT"),
                _ = sigterm.recv() => debug!("received SIGTERM"),
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    debug!("received Ctrl+C");
}

/// Initializes the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rollcall={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
