// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapters and the delivery pipeline.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Store,
    Directory,
    Monitor,
    Observability,
}

/// Kind of membership change as recorded downstream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Join,
    Leave,
}

/// Kind of notification as delivered by the messaging client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Join,
    Leave,
    Remove,
}

impl NotificationKind {
    /// Removal by an admin is recorded the same way as a voluntary leave.
    pub fn event_kind(self) -> EventKind {
        match self {
            NotificationKind::Join => EventKind::Join,
            NotificationKind::Leave | NotificationKind::Remove => EventKind::Leave,
        }
    }
}

/// Deterministic idempotency key of a membership event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(pub String);

impl EventKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Internal message id attached to a notification.
///
/// The client serializes it either as a bare string or as an object carrying
/// `_serialized`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMessageId {
    Plain(String),
    Structured {
        #[serde(rename = "_serialized")]
        serialized: String,
    },
}

impl RawMessageId {
    pub fn as_str(&self) -> &str {
        match self {
            RawMessageId::Plain(s) => s,
            RawMessageId::Structured { serialized } => serialized,
        }
    }
}

/// A group notification exactly as the messaging client reported it.
///
/// Any field may be missing; the normalizer decides what is recoverable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub recipient_ids: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub id: Option<RawMessageId>,
    #[serde(default)]
    pub author: Option<String>,
}

/// The canonical unit processed by the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub chat_id: String,
    pub user_id: String,
    pub kind: EventKind,
    pub timestamp_unix: i64,
    pub group_name: String,
    pub user_name: String,
    pub event_key: EventKey,
}

impl MembershipEvent {
    /// Wall-clock time of the membership change.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp_unix, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Human-readable local time used in the durability log and spreadsheet rows.
    pub fn display_timestamp(&self) -> String {
        self.occurred_at()
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M:%S")
            .to_string()
    }
}

/// Result of a successful idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was written.
    Inserted,
    /// A record with the same event key already existed; nothing was written.
    Duplicate,
}

/// Process-wide throttling state derived from sampled CPU usage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    #[default]
    Normal,
    Economy,
    Emergency,
}

impl OperatingMode {
    /// Numeric encoding used for the mode gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            OperatingMode::Normal => 0.0,
            OperatingMode::Economy => 1.0,
            OperatingMode::Emergency => 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_normalizes_to_leave() {
        assert_eq!(NotificationKind::Join.event_kind(), EventKind::Join);
        assert_eq!(NotificationKind::Leave.event_kind(), EventKind::Leave);
        assert_eq!(NotificationKind::Remove.event_kind(), EventKind::Leave);
    }

    #[test]
    fn event_kind_renders_uppercase() {
        assert_eq!(EventKind::Join.to_string(), "JOIN");
        assert_eq!(serde_json::to_string(&EventKind::Leave).unwrap(), "\"LEAVE\"");
    }

    #[test]
    fn raw_notification_accepts_client_shapes() {
        let json = r#"{
            "chatId": "120363025@g.us",
            "recipientIds": ["5511987654321@c.us"],
            "timestamp": 1700000000,
            "id": {"_serialized": "false_120363025@g.us_ABC_5511987654321@c.us"}
        }"#;
        let raw: RawNotification = serde_json::from_str(json).unwrap();
        assert_eq!(raw.chat_id.as_deref(), Some("120363025@g.us"));
        assert_eq!(raw.recipient_ids.len(), 1);
        assert_eq!(
            raw.id.as_ref().map(RawMessageId::as_str),
            Some("false_120363025@g.us_ABC_5511987654321@c.us")
        );

        let sparse: RawNotification = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert!(sparse.chat_id.is_none());
        assert!(sparse.recipient_ids.is_empty());
        assert_eq!(sparse.id, Some(RawMessageId::Plain("abc".into())));
    }

    #[test]
    fn occurred_at_uses_unix_seconds() {
        let event = MembershipEvent {
            chat_id: "G1".into(),
            user_id: "U1".into(),
            kind: EventKind::Join,
            timestamp_unix: 1_700_000_000,
            group_name: "G1".into(),
            user_name: "U1".into(),
            event_key: EventKey("k".into()),
        };
        assert_eq!(event.occurred_at().to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn operating_mode_round_trips_through_strings() {
        use std::str::FromStr;
        for mode in [
            OperatingMode::Normal,
            OperatingMode::Economy,
            OperatingMode::Emergency,
        ] {
            assert_eq!(OperatingMode::from_str(&mode.to_string()).unwrap(), mode);
        }
        assert_eq!(OperatingMode::default(), OperatingMode::Normal);
    }
}
