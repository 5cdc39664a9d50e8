// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for Rollcall.
//!
//! - [`RetryPolicy`]: bounded attempts with fixed or exponential backoff.
//! - [`AdmissionController`]: CPU-driven operating mode with hysteresis and
//!   a concurrency gate for live deliveries.
//! - [`SysinfoMonitor`]: process CPU sampling behind the `ResourceMonitor` port.

pub mod admission;
pub mod monitor;
pub mod retry;

pub use admission::{Admission, AdmissionController, AdmissionPermit, ModeProfile, Thresholds};
pub use monitor::{SysinfoMonitor, run_sampler};
pub use retry::{Attempted, RetryPolicy};
