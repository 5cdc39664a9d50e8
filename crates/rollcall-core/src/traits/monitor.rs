// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource sampling capability consumed by the admission controller.

use crate::error::RollcallError;

/// Samples process resource usage.
pub trait ResourceMonitor: Send + Sync {
    /// CPU used by this process since the previous sample, in percent of total capacity.
    fn sample_cpu_percent(&self) -> Result<f64, RollcallError>;
}
