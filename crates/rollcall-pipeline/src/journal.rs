// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newline-delimited JSON journal backing the event buffer.
//!
//! Appends are fsynced before they return. Removals rewrite the whole file
//! through a temporary sibling and an atomic rename, so a crash leaves either
//! the old or the new contents on disk, never a torn mix.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use rollcall_core::RollcallError;

use crate::buffer::BufferedEvent;

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RollcallError + '_ {
    move |source| RollcallError::Journal {
        path: path.to_path_buf(),
        source,
    }
}

impl Journal {
    /// Use `path` as the journal, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RollcallError> {
        let path = path.into();
        ensure_parent(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry currently on disk.
    pub fn replay(&self) -> Result<Vec<BufferedEvent>, RollcallError> {
        read_entries(&self.path)
    }

    /// Durably append one entry.
    pub fn append(&self, entry: &BufferedEvent) -> Result<(), RollcallError> {
        let mut line = serde_json::to_vec(entry)
            .map_err(|e| RollcallError::Internal(format!("failed to encode journal entry: {e}")))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err(&self.path))?;
        file.write_all(&line).map_err(io_err(&self.path))?;
        file.sync_data().map_err(io_err(&self.path))
    }

    /// Replace the journal contents with `entries`.
    pub fn rewrite<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a BufferedEvent>,
    ) -> Result<(), RollcallError> {
        let mut contents = Vec::new();
        let mut count = 0usize;
        for entry in entries {
            serde_json::to_writer(&mut contents, entry).map_err(|e| {
                RollcallError::Internal(format!("failed to encode journal entry: {e}"))
            })?;
            contents.push(b'\n');
            count += 1;
        }
        write_atomically(&self.path, &contents)?;
        debug!(path = %self.path.display(), entries = count, "journal rewritten");
        Ok(())
    }
}

/// Read a journal file without opening it for writing.
///
/// A missing file is an empty journal. Lines that fail to decode, invalid
/// UTF-8 from a write cut mid-character included, are skipped with a warning
/// so one torn write cannot block recovery of the rest.
pub fn read_entries(path: &Path) -> Result<Vec<BufferedEvent>, RollcallError> {
    read_json_lines(path, "journal")
}

/// Decode every newline-delimited JSON record in `path`, skipping bad lines.
pub(crate) fn read_json_lines<T: DeserializeOwned>(
    path: &Path,
    kind: &'static str,
) -> Result<Vec<T>, RollcallError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path)(e)),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(io_err(path))?;
        if line.trim_ascii().is_empty() {
            continue;
        }
        match serde_json::from_slice::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "skipping unreadable {kind} line"
            ),
        }
    }
    Ok(records)
}

/// Write `contents` to `path` via a synced temporary file and a rename.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), RollcallError> {
    ensure_parent(path)?;
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(contents).map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err(path))
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), RollcallError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_err(parent))
        }
        _ => Ok(()),
    }
}
