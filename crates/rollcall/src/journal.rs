// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rollcall journal` command implementation.
//!
//! Reads the buffer journal (or the emergency file) directly, so it works
//! whether or not `serve` is running.

use std::path::Path;

use rollcall_config::model::RollcallConfig;
use rollcall_core::{MembershipEvent, RollcallError};
use rollcall_pipeline::{BufferedEvent, EmergencyRecord, read_emergency_records, read_entries};

pub fn run_journal(
    config: &RollcallConfig,
    emergency: bool,
    json: bool,
) -> Result<(), RollcallError> {
    if emergency {
        let path = Path::new(&config.durability.emergency_path);
        let records = read_emergency_records(path)?;
        print_lines(path, &records, json, format_emergency)
    } else {
        let path = Path::new(&config.buffer.journal_path);
        let entries = read_entries(path)?;
        print_lines(path, &entries, json, format_pending)
    }
}

fn print_lines<T: serde::Serialize>(
    path: &Path,
    items: &[T],
    json: bool,
    format: fn(&T) -> String,
) -> Result<(), RollcallError> {
    if json {
        for item in items {
            let line = serde_json::to_string(item)
                .map_err(|e| RollcallError::Internal(format!("failed to encode entry: {e}")))?;
            println!("{line}");
        }
        return Ok(());
    }

    println!("{}: {} entries", path.display(), items.len());
    for item in items {
        println!("  {}", format(item));
    }
    Ok(())
}

fn describe(event: &MembershipEvent) -> String {
    format!(
        "{} {} - {} ({}) - {} ({})",
        event.display_timestamp(),
        event.kind,
        event.user_name,
        event.user_id,
        event.group_name,
        event.chat_id
    )
}

fn short_key(event: &MembershipEvent) -> &str {
    let key = event.event_key.as_str();
    key.get(..12).unwrap_or(key)
}

fn format_pending(entry: &BufferedEvent) -> String {
    format!(
        "{} attempts={} {}",
        short_key(&entry.event),
        entry.attempts,
        describe(&entry.event)
    )
}

fn format_emergency(record: &EmergencyRecord) -> String {
    format!(
        "{} [{}] attempts={} {}",
        short_key(&record.event),
        record.reason,
        record.attempts,
        describe(&record.event)
    )
}
