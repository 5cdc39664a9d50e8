// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only local sinks: the human-readable event log and the emergency
//! file for events the buffer could not hold.
//!
//! Neither file is ever read back by the pipeline.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use rollcall_core::{MembershipEvent, RollcallError};

use crate::journal::{ensure_parent, read_json_lines};

fn open_append(path: &Path) -> Result<File, RollcallError> {
    ensure_parent(path)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RollcallError::Journal {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `bytes` to an append-mode file and sync it to disk.
fn append_synced(file: &Mutex<File>, path: &Path, bytes: &[u8]) -> Result<(), RollcallError> {
    let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    file.write_all(bytes)
        .and_then(|()| file.sync_data())
        .map_err(|source| RollcallError::Journal {
            path: path.to_path_buf(),
            source,
        })
}

/// `<timestamp> - <KIND> - Usuário(s): <user> - Grupo: <group>`
pub fn format_event_line(event: &MembershipEvent) -> String {
    format!(
        "{} - {} - Usuário(s): {} - Grupo: {}",
        event.display_timestamp(),
        event.kind,
        event.user_name,
        event.group_name
    )
}

#[derive(Debug)]
pub struct DurabilityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl DurabilityLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RollcallError> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one event. Synced before returning.
    pub fn append_event(&self, event: &MembershipEvent) -> Result<(), RollcallError> {
        let line = format_event_line(event) + "\n";
        append_synced(&self.file, &self.path, line.as_bytes())
    }

    /// Record an operator-facing error line.
    pub fn append_error(&self, message: &str) -> Result<(), RollcallError> {
        let line = format!(
            "{} - ERROR - {}\n",
            Local::now().format("%d/%m/%Y %H:%M:%S"),
            message.replace('\n', " ")
        );
        append_synced(&self.file, &self.path, line.as_bytes())
    }
}

/// One line of the emergency file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRecord {
    pub written_at: DateTime<Utc>,
    pub reason: String,
    pub attempts: u32,
    pub event: MembershipEvent,
}

#[derive(Debug)]
pub struct EmergencyFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl EmergencyFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RollcallError> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(
        &self,
        event: &MembershipEvent,
        attempts: u32,
        reason: &str,
    ) -> Result<(), RollcallError> {
        let record = EmergencyRecord {
            written_at: Utc::now(),
            reason: reason.to_owned(),
            attempts,
            event: event.clone(),
        };
        let mut line = serde_json::to_vec(&record).map_err(|e| {
            RollcallError::Internal(format!("failed to encode emergency record: {e}"))
        })?;
        line.push(b'\n');
        append_synced(&self.file, &self.path, &line)
    }
}

/// Read an emergency file for manual recovery. A missing file has no records.
pub fn read_emergency_records(path: &Path) -> Result<Vec<EmergencyRecord>, RollcallError> {
    read_json_lines(path, "emergency")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::compute_key;
    use rollcall_core::EventKind;

    fn event() -> MembershipEvent {
        MembershipEvent {
            chat_id: "1203@g.us".into(),
            user_id: "5511987654321@c.us".into(),
            kind: EventKind::Leave,
            timestamp_unix: 1_700_000_000,
            group_name: "Turma A".into(),
            user_name: "Alice".into(),
            event_key: compute_key("1203@g.us", "5511987654321@c.us", EventKind::Leave, 1_700_000_000),
        }
    }

    #[test]
    fn event_line_format() {
        let e = event();
        let line = format_event_line(&e);
        assert_eq!(
            line,
            format!("{} - LEAVE - Usuário(s): Alice - Grupo: Turma A", e.display_timestamp())
        );
    }

    #[test]
    fn log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = DurabilityLog::open(dir.path().join("logs/events.log")).unwrap();
        log.append_event(&event()).unwrap();
        log.append_event(&event()).unwrap();
        log.append_error("table whatsapp_events is missing").unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("LEAVE - Usuário(s): Alice - Grupo: Turma A"));
        assert!(lines[2].contains(" - ERROR - table whatsapp_events is missing"));
    }

    #[test]
    fn log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        DurabilityLog::open(&path).unwrap().append_event(&event()).unwrap();
        DurabilityLog::open(&path).unwrap().append_event(&event()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn emergency_records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = EmergencyFile::open(dir.path().join("emergency.jsonl")).unwrap();
        file.write(&event(), 3, "evicted from full buffer").unwrap();

        let records = read_emergency_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "evicted from full buffer");
        assert_eq!(records[0].attempts, 3);
        assert_eq!(records[0].event, event());
        assert!(read_emergency_records(&dir.path().join("none.jsonl")).unwrap().is_empty());
    }
}
