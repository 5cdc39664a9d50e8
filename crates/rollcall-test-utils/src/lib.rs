// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Rollcall integration tests.
//!
//! Provides mock adapters and a harness for fast, deterministic tests
//! without a messaging client, database, or spreadsheet.
//!
//! # Components
//!
//! - [`MockStore`] - Event store with unique-key semantics and scriptable failures
//! - [`MockDirectory`] - Contact and chat names from in-memory maps
//! - [`ScriptedMonitor`] - CPU samples from a fixed series
//! - [`MockSource`] - Inbound notifications injected by the test
//! - [`TestHarness`] - A full [`PipelineService`](rollcall_pipeline::PipelineService) over temp files

pub mod harness;
pub mod mock_directory;
pub mod mock_monitor;
pub mod mock_source;
pub mod mock_store;

pub use harness::{TestHarness, TestHarnessBuilder, notification};
pub use mock_directory::MockDirectory;
pub use mock_monitor::ScriptedMonitor;
pub use mock_source::MockSource;
pub use mock_store::MockStore;
