// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end behavior of the pipeline service over mock stores.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use rollcall_config::model::OverflowPolicy;
use rollcall_core::{
    EventKind, MembershipEventSource, NotificationKind, OperatingMode, RawNotification, StoreError,
};
use rollcall_pipeline::{DrainReport, UNKNOWN_GROUP, compute_key};
use rollcall_resilience::Admission;
use rollcall_test_utils::{MockSource, MockStore, TestHarness, notification};

const G1: &str = "1203630@g.us";
const U1: &str = "5511987654321@c.us";
const U2: &str = "5521912345678@c.us";
const TS: i64 = 1_700_000_000;

#[tokio::test(start_paused = true)]
async fn same_event_twice_gives_one_row_and_two_log_lines() {
    let h = TestHarness::builder().build().unwrap();

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;
    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    let rows = h.primary.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_key, compute_key("G1", "U1", EventKind::Join, TS));
    assert_eq!(h.log_lines().len(), 2);
    assert_eq!(h.service.status().duplicates, 1);
}

#[tokio::test(start_paused = true)]
async fn unreachable_primary_buffers_then_drain_delivers() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    assert_eq!(h.primary.calls(), 3);
    let journal = h.journal_entries();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].attempts, 3);
    assert_eq!(journal[0].event.event_key, compute_key("G1", "U1", EventKind::Join, TS));
    assert_eq!(h.service.buffer().len(), 1);
    assert_eq!(h.log_lines().len(), 1);

    h.primary.set_up();
    let report = h.service.drain_buffer().await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(h.primary.row_count(), 1);
    assert!(h.service.buffer().is_empty());
    assert!(h.journal_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn secondary_store_takes_over_when_primary_is_down() {
    let h = TestHarness::builder().with_secondary().build().unwrap();
    h.primary.set_down(MockStore::unreachable());

    h.notify(NotificationKind::Leave, "G1", &["U1"], Some(TS)).await;

    let secondary = h.secondary.as_ref().unwrap();
    assert_eq!(secondary.row_count(), 1);
    assert!(h.journal_entries().is_empty());
    assert_eq!(h.service.status().fallback, 1);

    // Remembered after the secondary append, so a repeat is not appended twice.
    h.notify(NotificationKind::Leave, "G1", &["U1"], Some(TS)).await;
    assert_eq!(secondary.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn resolved_names_reach_store_and_log() {
    let h = TestHarness::builder().build().unwrap();
    h.directory.add_contact(U1, "Alice");
    h.directory.add_chat(G1, "Turma A");

    h.notify(NotificationKind::Join, G1, &[U1, U2], Some(TS)).await;

    let rows = h.primary.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].user_name, "Alice");
    assert_eq!(rows[0].group_name, "Turma A");
    assert_eq!(rows[1].user_name, "21 91234-5678");

    let lines = h.log_lines();
    assert!(lines[0].ends_with(" - JOIN - Usuário(s): Alice - Grupo: Turma A"), "{lines:?}");
    assert!(lines[1].ends_with(" - JOIN - Usuário(s): 21 91234-5678 - Grupo: Turma A"), "{lines:?}");
}

#[tokio::test(start_paused = true)]
async fn remove_is_recorded_as_leave() {
    let h = TestHarness::builder().build().unwrap();
    h.notify(NotificationKind::Remove, "G1", &["U1"], Some(TS)).await;

    let rows = h.primary.rows();
    assert_eq!(rows[0].kind, EventKind::Leave);
    assert!(h.log_lines()[0].contains(" - LEAVE - "));
}

#[tokio::test(start_paused = true)]
async fn emergency_mode_logs_and_buffers_without_delivery() {
    let h = TestHarness::builder().build().unwrap();
    h.directory.add_contact(U1, "Alice");
    h.admission.observe(95.0);
    assert_eq!(h.admission.mode(), OperatingMode::Emergency);

    h.notify(NotificationKind::Join, G1, &[U1], Some(TS)).await;

    assert_eq!(h.primary.calls(), 0);
    assert_eq!(h.directory.lookups(), 0);
    let lines = h.log_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(&format!("Usuário(s): 11 98765-4321 - Grupo: {UNKNOWN_GROUP}")));
    let journal = h.journal_entries();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].attempts, 0);

    // Drain is suspended in Emergency.
    assert_eq!(h.service.drain_buffer().await, Some(DrainReport::default()));
    assert_eq!(h.service.buffer().len(), 1);

    h.admission.observe(10.0);
    let report = h.service.drain_buffer().await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(h.primary.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn economy_mode_buffers_when_the_slot_is_taken() {
    let h = TestHarness::builder().build().unwrap();
    h.admission.observe(75.0);
    let held = h.admission.acquire().await;
    assert!(matches!(held, Admission::Granted(_)));

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    assert_eq!(h.primary.calls(), 0);
    assert_eq!(h.service.buffer().len(), 1);
    assert_eq!(h.log_lines().len(), 1);

    drop(held);
    h.notify(NotificationKind::Join, "G1", &["U2"], Some(TS)).await;
    assert_eq!(h.primary.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn full_buffer_evicts_oldest_to_emergency_file() {
    let h = TestHarness::builder().with_capacity(1).build().unwrap();
    h.primary.set_down(MockStore::unreachable());

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;
    h.notify(NotificationKind::Join, "G1", &["U2"], Some(TS)).await;

    let journal = h.journal_entries();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].event.user_id, "U2");

    let emergency = h.emergency_records();
    assert_eq!(emergency.len(), 1);
    assert_eq!(emergency[0].event.user_id, "U1");
    assert_eq!(emergency[0].attempts, 3);
    assert_eq!(h.log_lines().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reject_policy_sends_the_new_event_to_the_emergency_file() {
    let h = TestHarness::builder()
        .with_capacity(1)
        .with_overflow(OverflowPolicy::Reject)
        .build()
        .unwrap();
    h.primary.set_down(MockStore::unreachable());

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;
    h.notify(NotificationKind::Join, "G1", &["U2"], Some(TS)).await;

    assert_eq!(h.journal_entries()[0].event.user_id, "U1");
    assert_eq!(h.emergency_records()[0].event.user_id, "U2");
}

#[tokio::test(start_paused = true)]
async fn buffered_events_survive_a_restart() {
    let mut h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());
    h.notify(NotificationKind::Join, "G1", &["U1", "U2"], Some(TS)).await;
    assert_eq!(h.journal_entries().len(), 2);

    h.restart().unwrap();
    assert_eq!(h.service.buffer().len(), 2);

    h.primary.set_up();
    let report = h.service.drain_buffer().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert!(h.journal_entries().is_empty());
    assert_eq!(h.primary.row_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_drain_attempts_are_discarded_and_logged() {
    let h = TestHarness::builder().with_max_attempts(4).build().unwrap();
    h.primary.set_down(MockStore::unreachable());
    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    let first = h.service.drain_buffer().await.unwrap();
    assert_eq!(first.requeued, 1);
    assert_eq!(h.journal_entries()[0].attempts, 4);

    let second = h.service.drain_buffer().await.unwrap();
    assert_eq!(second.discarded, 1);
    assert!(h.service.buffer().is_empty());
    assert!(h.journal_entries().is_empty());
    assert_eq!(h.service.status().discarded, 1);

    let lines = h.log_lines();
    assert!(lines.last().unwrap().contains(" - ERROR - event "), "{lines:?}");
    assert!(lines.last().unwrap().contains("discarded after 5 attempts"), "{lines:?}");
}

#[tokio::test(start_paused = true)]
async fn schema_failure_is_logged_for_the_operator() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.fail_next(
        1,
        StoreError::Schema {
            message: "no such table: whatsapp_events".into(),
        },
    );

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    assert_eq!(h.primary.calls(), 1);
    assert_eq!(h.journal_entries()[0].attempts, 1);
    let lines = h.log_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("schema failure"), "{lines:?}");
}

#[tokio::test(start_paused = true)]
async fn malformed_notifications_are_dropped() {
    let h = TestHarness::builder().build().unwrap();
    h.service
        .handle(
            RawNotification {
                recipient_ids: vec!["U1".into()],
                ..RawNotification::default()
            },
            NotificationKind::Join,
        )
        .await;

    assert!(h.log_lines().is_empty());
    assert_eq!(h.primary.calls(), 0);
    let status = h.service.status();
    assert_eq!(status.rejected, 1);
    assert_eq!(status.received, 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_directory_falls_back_to_formatted_ids() {
    let h = TestHarness::builder().build().unwrap();
    h.directory.set_failing(true);

    h.notify(NotificationKind::Join, G1, &[U1], Some(TS)).await;

    let row = &h.primary.rows()[0];
    assert_eq!(row.user_name, "11 98765-4321");
    assert_eq!(row.group_name, UNKNOWN_GROUP);
    // Three attempts each for the contact and the chat.
    assert_eq!(h.directory.lookups(), 6);
}

#[tokio::test(start_paused = true)]
async fn source_feeds_the_service() {
    let h = TestHarness::builder().without_directory().build().unwrap();
    let source = MockSource::new();
    for (kind, user) in [
        (NotificationKind::Join, "U1"),
        (NotificationKind::Leave, "U1"),
        (NotificationKind::Remove, "U2"),
    ] {
        source.inject(
            kind,
            RawNotification {
                chat_id: Some("G1".into()),
                recipient_ids: vec![user.into()],
                timestamp: Some(TS),
                ..RawNotification::default()
            },
        );
    }
    source.close();

    source.run(h.service.clone()).await.unwrap();

    let kinds: Vec<_> = h.primary.rows().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [EventKind::Join, EventKind::Leave, EventKind::Leave]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_makes_a_final_drain_attempt() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());
    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;
    h.primary.set_up();

    let service = Arc::clone(&h.service);
    service.shutdown(std::time::Duration::from_secs(5)).await;

    assert_eq!(h.primary.row_count(), 1);
    assert!(h.journal_entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reclaim_keeps_live_dedup_entries() {
    let h = TestHarness::builder().build().unwrap();
    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;
    assert_eq!(h.service.dedup().len(), 1);

    h.service.reclaim();
    assert_eq!(h.service.dedup().len(), 1);
    assert_eq!(h.service.status().dedup_entries, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_a_delivery_in_progress() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());

    h.dispatch(NotificationKind::Join, "G1", &["U1"], Some(TS));
    h.service.shutdown(Duration::from_secs(10)).await;

    assert_eq!(h.log_lines().len(), 1);
    let journal = h.journal_entries();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].event.event_key, compute_key("G1", "U1", EventKind::Join, TS));
    // Three live attempts, then one from the final drain.
    assert_eq!(h.primary.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn grace_expiry_buffers_an_unfinished_delivery() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());

    h.dispatch(NotificationKind::Join, "G1", &["U1"], Some(TS));
    // Shorter than the first retry backoff.
    h.service.shutdown(Duration::from_millis(5)).await;

    assert_eq!(h.log_lines().len(), 1);
    assert_eq!(h.journal_entries().len(), 1);
    assert_eq!(h.service.buffer().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dispatched_notifications_deliver_side_by_side() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());
    let source = MockSource::new();
    for user in ["U1", "U2"] {
        source.inject(NotificationKind::Join, notification("G1", &[user], Some(TS)));
    }
    source.close();

    source.run(h.service.dispatcher()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    // Both logged and both retrying, neither waiting on the other.
    assert_eq!(h.log_lines().len(), 2);
    assert_eq!(h.primary.calls(), 2);
    assert_eq!(h.admission.in_flight(), 2);

    h.service.shutdown(Duration::from_secs(10)).await;
    assert_eq!(h.journal_entries().len(), 2);
    assert_eq!(h.admission.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_copies_of_one_notification_give_one_row() {
    let h = TestHarness::builder().build().unwrap();

    for _ in 0..4 {
        h.dispatch(NotificationKind::Leave, "G1", &["U1"], Some(TS));
    }
    h.service.shutdown(Duration::from_secs(10)).await;

    assert_eq!(h.primary.row_count(), 1);
    assert_eq!(h.log_lines().len(), 4);
    assert!(h.journal_entries().is_empty());
    assert_eq!(h.service.status().duplicates, 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_copies_while_primary_is_down_buffer_once() {
    let h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());

    tokio::join!(
        h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)),
        h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)),
    );

    assert_eq!(h.journal_entries().len(), 1);
    assert_eq!(h.service.buffer().len(), 1);

    h.primary.set_up();
    h.service.drain_buffer().await.unwrap();
    assert_eq!(h.primary.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_directory_does_not_hold_back_the_log_line() {
    let h = TestHarness::builder().build().unwrap();
    h.directory.set_silent(true);

    let start = tokio::time::Instant::now();
    h.notify(NotificationKind::Join, G1, &[U1], Some(TS)).await;

    // Bounded by the default resolver deadline.
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    let lines = h.log_lines();
    assert_eq!(lines.len(), 1);
    assert!(
        lines[0].ends_with(&format!("Usuário(s): 11 98765-4321 - Grupo: {UNKNOWN_GROUP}")),
        "{lines:?}"
    );
    assert_eq!(h.primary.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn torn_journal_tail_does_not_block_restart() {
    let mut h = TestHarness::builder().build().unwrap();
    h.primary.set_down(MockStore::unreachable());
    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    // An append cut off inside the two bytes of 'ã'.
    let torn = "{\"event\":{\"group_name\":\"Comunicação".as_bytes();
    let mut journal = std::fs::OpenOptions::new()
        .append(true)
        .open(h.journal_path())
        .unwrap();
    journal.write_all(&torn[..torn.len() - 2]).unwrap();
    drop(journal);

    h.restart().unwrap();
    assert_eq!(h.service.buffer().len(), 1);

    h.primary.set_up();
    assert_eq!(h.service.drain_buffer().await.unwrap().delivered, 1);
    assert_eq!(h.primary.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pacing_delay_follows_the_delivery_and_holds_the_slot() {
    let h = TestHarness::builder().with_mode_delay_ms(200).build().unwrap();
    h.admission.observe(75.0);

    h.dispatch(NotificationKind::Join, "G1", &["U1"], Some(TS));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.primary.row_count(), 1);
    assert_eq!(h.admission.in_flight(), 1);

    // Economy has one slot, still taken by the pause.
    h.notify(NotificationKind::Join, "G1", &["U2"], Some(TS)).await;
    assert_eq!(h.primary.row_count(), 1);
    assert_eq!(h.service.buffer().len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.admission.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_insert_is_logged_and_buffered_without_fallback() {
    let h = TestHarness::builder().with_secondary().build().unwrap();
    h.primary.fail_next(
        1,
        StoreError::Rejected {
            message: "CHECK constraint failed".into(),
        },
    );

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    assert_eq!(h.secondary.as_ref().unwrap().row_count(), 0);
    assert_eq!(h.journal_entries().len(), 1);
    let lines = h.log_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("rejected insert"), "{lines:?}");
}

#[cfg(target_os = "linux")]
#[tokio::test(start_paused = true)]
async fn unwritable_durability_log_is_counted_for_every_line() {
    let mut h = TestHarness::builder().build().unwrap();
    h.config.durability.log_path = "/dev/full".into();
    h.restart().unwrap();
    h.primary.fail_next(
        1,
        StoreError::Schema {
            message: "no such table: whatsapp_events".into(),
        },
    );

    h.notify(NotificationKind::Join, "G1", &["U1"], Some(TS)).await;

    // Event line, the store failure itself, then the error line.
    assert_eq!(h.service.status().errors, 3);
    assert_eq!(h.emergency_records().len(), 1);
    assert_eq!(h.journal_entries().len(), 1);
}
