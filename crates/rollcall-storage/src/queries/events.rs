// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent writes and read-back for the `whatsapp_events` table.

use rollcall_core::{InsertOutcome, MembershipEvent, RollcallError, StoreError};
use rusqlite::{ErrorCode, params};

use crate::database::Database;

/// A row as stored in `whatsapp_events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub timestamp: String,
    pub event_type: String,
    pub user_id: String,
    pub user_name: String,
    pub group_id: String,
    pub group_name: String,
    pub event_key: String,
}

/// Insert an event unless its key is already present.
///
/// A conflicting `event_key` writes nothing and reports [`InsertOutcome::Duplicate`].
pub async fn insert_event(
    db: &Database,
    event: &MembershipEvent,
) -> Result<InsertOutcome, StoreError> {
    let timestamp = event.occurred_at().to_rfc3339();
    let event_type = event.kind.to_string();
    let event = event.clone();

    db.connection()
        .call(
            move |conn| -> Result<Result<InsertOutcome, StoreError>, rusqlite::Error> {
                let written = conn.execute(
                    "INSERT INTO whatsapp_events
                        (timestamp, event_type, user_id, user_name, group_id, group_name, event_key)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(event_key) DO NOTHING",
                    params![
                        timestamp,
                        event_type,
                        event.user_id,
                        event.user_name,
                        event.chat_id,
                        event.group_name,
                        event.event_key.as_str(),
                    ],
                );
                Ok(match written {
                    Ok(0) => Ok(InsertOutcome::Duplicate),
                    Ok(_) => Ok(InsertOutcome::Inserted),
                    Err(e) => Err(classify(e)),
                })
            },
        )
        .await
        .map_err(|e| StoreError::Transient {
            message: e.to_string(),
        })?
}

/// Map a SQLite failure onto the retry classification.
pub fn classify(err: rusqlite::Error) -> StoreError {
    let message = err.to_string();
    if message.contains("no such table") || message.contains("no such column") {
        return StoreError::Schema { message };
    }
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Rejected { message },
        Some(ErrorCode::ReadOnly) | Some(ErrorCode::PermissionDenied) => {
            StoreError::Rejected { message }
        }
        _ => StoreError::Transient { message },
    }
}

/// Number of rows stored under `event_key`.
pub async fn count_by_key(db: &Database, event_key: &str) -> Result<i64, RollcallError> {
    let event_key = event_key.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM whatsapp_events WHERE event_key = ?1",
                params![event_key],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent events for a group, newest first.
pub async fn recent_for_group(
    db: &Database,
    group_id: &str,
    limit: i64,
) -> Result<Vec<StoredEvent>, RollcallError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<StoredEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT timestamp, event_type, user_id, user_name, group_id, group_name, event_key
                 FROM whatsapp_events
                 WHERE group_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![group_id, limit], |row| {
                Ok(StoredEvent {
                    timestamp: row.get(0)?,
                    event_type: row.get(1)?,
                    user_id: row.get(2)?,
                    user_name: row.get(3)?,
                    group_id: row.get(4)?,
                    group_name: row.get(5)?,
                    event_key: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{EventKey, EventKind};
    use std::time::Duration;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), Duration::from_secs(1))
            .await
            .unwrap();
        (db, dir)
    }

    fn event(key: &str, ts: i64) -> MembershipEvent {
        MembershipEvent {
            chat_id: "120363025@g.us".into(),
            user_id: "5511987654321@c.us".into(),
            kind: EventKind::Join,
            timestamp_unix: ts,
            group_name: "Condomínio".into(),
            user_name: "Ana".into(),
            event_key: EventKey(key.into()),
        }
    }

    #[tokio::test]
    async fn insert_then_conflict_is_duplicate() {
        let (db, _dir) = setup_db().await;

        let first = insert_event(&db, &event("k1", 1_700_000_000)).await.unwrap();
        assert_eq!(first, InsertOutcome::Inserted);
        let second = insert_event(&db, &event("k1", 1_700_000_000)).await.unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);

        assert_eq!(count_by_key(&db, "k1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stored_row_uses_iso_timestamp_and_uppercase_kind() {
        let (db, _dir) = setup_db().await;
        insert_event(&db, &event("k2", 1_700_000_000)).await.unwrap();

        let rows = recent_for_group(&db, "120363025@g.us", 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2023-11-14T22:13:20+00:00");
        assert_eq!(rows[0].event_type, "JOIN");
        assert_eq!(rows[0].group_name, "Condomínio");
        assert_eq!(rows[0].event_key, "k2");
    }

    #[tokio::test]
    async fn missing_table_is_a_schema_failure() {
        let (db, _dir) = setup_db().await;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("DROP TABLE whatsapp_events;")
            })
            .await
            .unwrap();

        let err = insert_event(&db, &event("k3", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Schema { .. }), "got {err:?}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_key_store_one_row() {
        let (db, _dir) = setup_db().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                insert_event(&db, &event("same", 1_700_000_000)).await
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(count_by_key(&db, "same").await.unwrap(), 1);
    }
}
