// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spreadsheet secondary store for Rollcall.
//!
//! Appends one row per membership event through the spreadsheet values
//! `append` endpoint. Rows are not idempotent; the store is only used when
//! the primary store cannot take an event.

pub mod adapter;
pub mod client;
pub mod types;

pub use adapter::SheetsEventStore;
pub use client::SheetsClient;
