// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource monitor replaying a scripted CPU series.

use std::collections::VecDeque;
use std::sync::Mutex;

use rollcall_core::{ResourceMonitor, RollcallError};

/// Returns queued samples in order, then repeats the last one.
pub struct ScriptedMonitor {
    samples: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl ScriptedMonitor {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self {
            samples: Mutex::new(samples.into_iter().collect()),
            last: Mutex::new(0.0),
        }
    }

    pub fn push(&self, sample: f64) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.push_back(sample);
        }
    }
}

impl ResourceMonitor for ScriptedMonitor {
    fn sample_cpu_percent(&self) -> Result<f64, RollcallError> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|_| RollcallError::Internal("scripted monitor poisoned".to_string()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| RollcallError::Internal("scripted monitor poisoned".to_string()))?;
        if let Some(next) = samples.pop_front() {
            *last = next;
        }
        Ok(*last)
    }
}
