// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rollcall status` command implementation.
//!
//! Prints the snapshot a running `serve` writes to `status.path`. The
//! snapshot's age tells whether the writer is still alive.

use std::path::Path;

use chrono::{DateTime, Utc};
use rollcall_config::model::RollcallConfig;
use rollcall_core::RollcallError;
use rollcall_pipeline::{PipelineStatus, read_status};

/// Format seconds into a human-readable duration string.
fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn run_status(config: &RollcallConfig, json: bool) -> Result<(), RollcallError> {
    let path = Path::new(&config.status.path);
    if !path.exists() {
        println!("rollcall: no status snapshot at {}", path.display());
        println!("  Start with: rollcall serve");
        return Ok(());
    }

    let status = read_status(path)?;
    if json {
        let text = serde_json::to_string_pretty(&status)
            .map_err(|e| RollcallError::Internal(format!("failed to encode status: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", render_status(&status, Utc::now()));
    }
    Ok(())
}

fn render_status(status: &PipelineStatus, now: DateTime<Utc>) -> String {
    let age = format_age((now - status.updated_at).num_seconds());
    let cpu = status
        .cpu_percent
        .map(|c| format!("{c:.1}%"))
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    out.push_str("\n  rollcall status\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));
    out.push_str(&format!("    Updated:   {age} ago\n"));
    out.push_str(&format!("    Mode:      {} (cpu {cpu})\n", status.mode));
    out.push_str(&format!(
        "    Buffer:    {}/{} ({} in flight)\n",
        status.buffer_len, status.buffer_capacity, status.in_flight
    ));
    out.push_str(&format!("    Dedup:     {} keys\n", status.dedup_entries));
    out.push_str(&format!(
        "    Events:    {} received, {} rejected\n",
        status.received, status.rejected
    ));
    out.push_str(&format!(
        "    Delivered: {} ({} via fallback, {} duplicates, {} drained)\n",
        status.delivered, status.fallback, status.duplicates, status.drained
    ));
    out.push_str(&format!(
        "    Losses:    {} buffered, {} discarded, {} to emergency file\n",
        status.buffered, status.discarded, status.emergency_writes
    ));
    out.push_str(&format!("    Errors:    {}\n\n", status.errors));
    out
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rollcall_core::OperatingMode;

    use super::*;

    #[test]
    fn format_age_seconds() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(-3), "0s");
    }

    #[test]
    fn format_age_minutes_and_hours() {
        assert_eq!(format_age(125), "2m 5s");
        assert_eq!(format_age(3720), "1h 2m");
    }

    #[test]
    fn render_includes_counters() {
        let now = Utc::now();
        let status = PipelineStatus {
            updated_at: now - Duration::seconds(5),
            mode: OperatingMode::Economy,
            cpu_percent: Some(72.4),
            buffer_len: 3,
            buffer_capacity: 1000,
            in_flight: 1,
            dedup_entries: 9,
            received: 12,
            rejected: 1,
            delivered: 8,
            fallback: 2,
            duplicates: 1,
            buffered: 3,
            drained: 0,
            discarded: 0,
            emergency_writes: 0,
            errors: 4,
        };
        let text = render_status(&status, now);
        assert!(text.contains("Updated:   5s ago"));
        assert!(text.contains("Mode:      economy (cpu 72.4%)"));
        assert!(text.contains("Buffer:    3/1000 (1 in flight)"));
        assert!(text.contains("Errors:    4"));
    }

    #[test]
    fn missing_snapshot_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RollcallConfig::default();
        config.status.path = dir.path().join("status.json").display().to_string();
        run_status(&config, false).unwrap();
    }
}
