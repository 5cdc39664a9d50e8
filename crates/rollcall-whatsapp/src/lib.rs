// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp bridge adapter for Rollcall.
//!
//! The messaging client itself runs out of process. It writes one JSON record
//! per line describing group notifications plus the contact and chat names
//! it knows; this crate turns that stream into handler calls and directory
//! lookups.

pub mod directory;
pub mod records;
pub mod source;

pub use directory::BridgeDirectory;
pub use records::{BridgeRecord, ChatRecord, ContactRecord};
pub use source::{BridgeSource, PumpStats, pump};
