// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions (ports) for Rollcall.
//!
//! Adapters with a lifecycle extend [`PluginAdapter`] and use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod adapter;
pub mod directory;
pub mod monitor;
pub mod source;
pub mod store;

pub use adapter::PluginAdapter;
pub use directory::ChatDirectory;
pub use monitor::ResourceMonitor;
pub use source::{MembershipEventHandler, MembershipEventSource};
pub use store::EventStore;
