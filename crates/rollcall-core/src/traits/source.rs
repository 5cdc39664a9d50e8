// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound port: the messaging client pushes group notifications through it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RollcallError;
use crate::traits::adapter::PluginAdapter;
use crate::types::RawNotification;

/// Receiver of group membership notifications.
///
/// Implementations must never fail towards the caller; every problem is
/// handled (logged, persisted) on the receiving side.
#[async_trait]
pub trait MembershipEventHandler: Send + Sync {
    /// A member joined or was added to a group.
    async fn on_group_join(&self, notification: RawNotification);

    /// A member left a group.
    async fn on_group_leave(&self, notification: RawNotification);

    /// A member was removed from a group by an admin.
    async fn on_group_remove(&self, notification: RawNotification);
}

/// Producer of group membership notifications.
#[async_trait]
pub trait MembershipEventSource: PluginAdapter {
    /// Feeds notifications into `handler` until the underlying stream ends.
    ///
    /// Callers stop an unbounded source by dropping the returned future.
    async fn run(&self, handler: Arc<dyn MembershipEventHandler>) -> Result<(), RollcallError>;
}
