// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns raw group notifications into canonical membership events.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use rollcall_core::{MembershipEvent, NotificationKind, RawNotification};

use crate::key::compute_key;
use crate::names::{UNKNOWN_GROUP, format_user_id};

/// A user id embedded in the serialized message id, e.g.
/// `false_1203@g.us_3EB0_5511987654321@c.us`.
static EMBEDDED_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)@(c\.us|s\.whatsapp\.net)").expect("user id pattern is valid")
});

/// Why a notification was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("notification has no chat id")]
    MissingChatId,

    #[error("notification has no recipients and none could be recovered from its message id")]
    NoRecipient,
}

impl Rejection {
    /// Metric label for this rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingChatId => "missing_chat_id",
            Rejection::NoRecipient => "no_recipient",
        }
    }
}

/// Normalize one notification into one event per affected member.
///
/// Names are filled with formatted ids; the resolver replaces them later.
/// `now_unix` stands in for a missing or non-positive timestamp.
pub fn normalize(
    raw: &RawNotification,
    kind: NotificationKind,
    now_unix: i64,
) -> Result<Vec<MembershipEvent>, Rejection> {
    let chat_id = raw
        .chat_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(Rejection::MissingChatId)?;

    let mut recipients: Vec<String> = Vec::with_capacity(raw.recipient_ids.len());
    for id in raw.recipient_ids.iter().map(|id| id.trim()) {
        if !id.is_empty() && !recipients.iter().any(|seen| seen == id) {
            recipients.push(id.to_owned());
        }
    }
    if recipients.is_empty() {
        let recovered = raw
            .id
            .as_ref()
            .and_then(|id| recover_user_id(id.as_str()))
            .ok_or(Rejection::NoRecipient)?;
        recipients.push(recovered);
    }

    let timestamp_unix = match raw.timestamp {
        Some(ts) if ts > 0 => ts,
        _ => now_unix,
    };
    let kind = kind.event_kind();

    Ok(recipients
        .into_iter()
        .map(|user_id| MembershipEvent {
            chat_id: chat_id.to_owned(),
            event_key: compute_key(chat_id, &user_id, kind, timestamp_unix),
            user_name: format_user_id(&user_id),
            group_name: UNKNOWN_GROUP.to_owned(),
            user_id,
            kind,
            timestamp_unix,
        })
        .collect())
}

/// Pull the last user id out of a serialized message id.
///
/// The participant is the trailing component; the author, when present,
/// comes first.
fn recover_user_id(message_id: &str) -> Option<String> {
    EMBEDDED_USER
        .captures_iter(message_id)
        .last()
        .map(|caps| format!("{}@c.us", &caps[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{EventKind, RawMessageId};

    fn raw(chat: Option<&str>, recipients: &[&str], ts: Option<i64>) -> RawNotification {
        RawNotification {
            chat_id: chat.map(str::to_owned),
            recipient_ids: recipients.iter().map(|r| (*r).to_owned()).collect(),
            timestamp: ts,
            id: None,
            author: None,
        }
    }

    #[test]
    fn join_with_one_recipient() {
        let events = normalize(
            &raw(Some("G1"), &["U1"], Some(1_700_000_000)),
            NotificationKind::Join,
            0,
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.chat_id, "G1");
        assert_eq!(e.user_id, "U1");
        assert_eq!(e.kind, EventKind::Join);
        assert_eq!(e.timestamp_unix, 1_700_000_000);
        assert_eq!(e.event_key, compute_key("G1", "U1", EventKind::Join, 1_700_000_000));
    }

    #[test]
    fn remove_becomes_leave() {
        let events =
            normalize(&raw(Some("G1"), &["U1"], Some(5)), NotificationKind::Remove, 0).unwrap();
        assert_eq!(events[0].kind, EventKind::Leave);
        assert_eq!(events[0].event_key, compute_key("G1", "U1", EventKind::Leave, 5));
    }

    #[test]
    fn missing_chat_is_rejected() {
        assert_eq!(
            normalize(&raw(None, &["U1"], Some(1)), NotificationKind::Join, 0),
            Err(Rejection::MissingChatId)
        );
        assert_eq!(
            normalize(&raw(Some("  "), &["U1"], Some(1)), NotificationKind::Join, 0),
            Err(Rejection::MissingChatId)
        );
    }

    #[test]
    fn missing_or_zero_timestamp_uses_now() {
        for ts in [None, Some(0), Some(-3)] {
            let events =
                normalize(&raw(Some("G1"), &["U1"], ts), NotificationKind::Join, 1_234).unwrap();
            assert_eq!(events[0].timestamp_unix, 1_234);
        }
    }

    #[test]
    fn recipients_fan_out_and_repeats_collapse() {
        let events = normalize(
            &raw(Some("G1"), &["U1", "U2", "U1", ""], Some(9)),
            NotificationKind::Join,
            0,
        )
        .unwrap();
        let users: Vec<_> = events.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, ["U1", "U2"]);
        assert_ne!(events[0].event_key, events[1].event_key);
    }

    #[test]
    fn recipient_is_recovered_from_message_id() {
        let mut n = raw(Some("1203@g.us"), &[], Some(9));
        n.id = Some(RawMessageId::Structured {
            serialized: "false_1203@g.us_3EB0C431_5511987654321@c.us".into(),
        });
        let events = normalize(&n, NotificationKind::Leave, 0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, "5511987654321@c.us");
        assert_eq!(events[0].user_name, "11 98765-4321");
    }

    #[test]
    fn multi_device_domain_is_recovered_too() {
        let mut n = raw(Some("1203@g.us"), &[], Some(9));
        n.id = Some(RawMessageId::Plain("true_1203@g.us_ABC_5521912345678@s.whatsapp.net".into()));
        let events = normalize(&n, NotificationKind::Join, 0).unwrap();
        assert_eq!(events[0].user_id, "5521912345678@c.us");
    }

    #[test]
    fn unrecoverable_recipient_is_rejected() {
        let mut n = raw(Some("G1"), &[], Some(9));
        assert_eq!(normalize(&n, NotificationKind::Join, 0), Err(Rejection::NoRecipient));
        n.id = Some(RawMessageId::Plain("false_G1_3EB0C431".into()));
        assert_eq!(normalize(&n, NotificationKind::Join, 0), Err(Rejection::NoRecipient));
    }

    #[test]
    fn placeholder_names_are_formatted_ids() {
        let events = normalize(
            &raw(Some("1203@g.us"), &["5511987654321@c.us"], Some(9)),
            NotificationKind::Join,
            0,
        )
        .unwrap();
        assert_eq!(events[0].user_name, "11 98765-4321");
        assert_eq!(events[0].group_name, UNKNOWN_GROUP);
    }
}
