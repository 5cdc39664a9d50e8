// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership event source reading the bridge's NDJSON stream.
//!
//! The bridge is either a child process (`bridge.command`) whose stdout is
//! read line by line, or, when no command is configured, this process's
//! stdin. Contact and chat records update the [`BridgeDirectory`];
//! notification records are passed to the handler in arrival order. The next
//! line is read once the handler returns, so handlers that deliver should
//! hand the work off to a task rather than await it.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use rollcall_config::model::BridgeConfig;
use rollcall_core::{
    AdapterType, HealthStatus, MembershipEventHandler, MembershipEventSource, PluginAdapter,
    RollcallError,
};

use crate::directory::BridgeDirectory;
use crate::records::BridgeRecord;

/// Counts of what one stream carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub notifications: u64,
    pub directory_updates: u64,
    pub malformed: u64,
}

/// Feed every line of `reader` to the directory or the handler.
///
/// Blank lines are skipped. Lines that are not a known record are logged and
/// skipped; only a read error ends the stream early.
pub async fn pump<R>(
    reader: R,
    directory: &BridgeDirectory,
    handler: &dyn MembershipEventHandler,
) -> Result<PumpStats, RollcallError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = PumpStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.map_err(|e| RollcallError::Source {
        message: "failed to read bridge stream".into(),
        source: Some(Box::new(e)),
    })? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<BridgeRecord>(line) {
            Ok(record) => record,
            Err(e) => {
                stats.malformed += 1;
                warn!(error = %e, "skipping malformed bridge line");
                continue;
            }
        };

        match record {
            BridgeRecord::GroupJoin(n) => {
                stats.notifications += 1;
                handler.on_group_join(n).await;
            }
            BridgeRecord::GroupLeave(n) => {
                stats.notifications += 1;
                handler.on_group_leave(n).await;
            }
            BridgeRecord::GroupRemove(n) => {
                stats.notifications += 1;
                handler.on_group_remove(n).await;
            }
            BridgeRecord::Contact(contact) => {
                stats.directory_updates += 1;
                directory.apply_contact(&contact);
            }
            BridgeRecord::Chat(chat) => {
                stats.directory_updates += 1;
                directory.apply_chat(&chat);
            }
        }
    }

    Ok(stats)
}

/// Source adapter over the bridge sidecar.
pub struct BridgeSource {
    config: BridgeConfig,
    directory: Arc<BridgeDirectory>,
    notifications: AtomicU64,
}

impl BridgeSource {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            directory: Arc::new(BridgeDirectory::new()),
            notifications: AtomicU64::new(0),
        }
    }

    /// Names learned from the stream, for the pipeline's resolver.
    pub fn directory(&self) -> Arc<BridgeDirectory> {
        self.directory.clone()
    }

    /// Notifications dispatched so far across runs.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    async fn run_child(
        &self,
        program: &str,
        args: &[String],
        handler: &dyn MembershipEventHandler,
    ) -> Result<PumpStats, RollcallError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RollcallError::Source {
                message: format!("failed to spawn bridge `{program}`"),
                source: Some(Box::new(e)),
            })?;

        info!(program, pid = child.id(), "bridge process started");

        let stdout = child.stdout.take().ok_or_else(|| RollcallError::Source {
            message: "bridge stdout was not captured".into(),
            source: None,
        })?;

        let stats = pump(BufReader::new(stdout), &self.directory, handler).await?;

        let status = child.wait().await.map_err(|e| RollcallError::Source {
            message: "failed to wait for bridge process".into(),
            source: Some(Box::new(e)),
        })?;
        if !status.success() {
            return Err(RollcallError::Source {
                message: format!("bridge `{program}` exited with {status}"),
                source: None,
            });
        }
        Ok(stats)
    }
}

#[async_trait]
impl PluginAdapter for BridgeSource {
    fn name(&self) -> &str {
        "whatsapp-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RollcallError> {
        debug!("bridge source shut down");
        Ok(())
    }
}

#[async_trait]
impl MembershipEventSource for BridgeSource {
    async fn run(&self, handler: Arc<dyn MembershipEventHandler>) -> Result<(), RollcallError> {
        let stats = match self.config.command.split_first() {
            Some((program, args)) => self.run_child(program, args, handler.as_ref()).await?,
            None => {
                info!("reading bridge records from stdin");
                pump(
                    BufReader::new(tokio::io::stdin()),
                    &self.directory,
                    handler.as_ref(),
                )
                .await?
            }
        };

        self.notifications
            .fetch_add(stats.notifications, Ordering::Relaxed);
        info!(
            notifications = stats.notifications,
            directory_updates = stats.directory_updates,
            malformed = stats.malformed,
            "bridge stream ended"
        );
        Ok(())
    }
}
