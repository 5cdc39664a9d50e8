// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Rollcall.
//!
//! This crate provides the trait definitions (ports), error types, and
//! membership event types used throughout the Rollcall workspace. Stores,
//! event sources, directories, and resource monitors implement traits
//! defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{RollcallError, StoreError};
pub use types::{
    AdapterType, EventKey, EventKind, HealthStatus, InsertOutcome, MembershipEvent,
    NotificationKind, OperatingMode, RawMessageId, RawNotification,
};

pub use traits::{
    ChatDirectory, EventStore, MembershipEventHandler, MembershipEventSource, PluginAdapter,
    ResourceMonitor,
};
