// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line format emitted by the bridge sidecar.
//!
//! One JSON object per line, discriminated by `type`:
//!
//! ```json
//! {"type":"group_join","chatId":"1203@g.us","recipientIds":["5511987654321@c.us"],"timestamp":1700000000}
//! {"type":"contact","id":"5511987654321@c.us","name":null,"pushname":"Alice"}
//! {"type":"chat","id":"1203@g.us","name":"Turma A","isGroup":true}
//! ```

use serde::{Deserialize, Serialize};

use rollcall_core::RawNotification;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRecord {
    GroupJoin(RawNotification),
    GroupLeave(RawNotification),
    GroupRemove(RawNotification),
    Contact(ContactRecord),
    Chat(ChatRecord),
}

/// A contact as known to the messaging client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "pushName")]
    pub pushname: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub verified_name: Option<String>,
}

impl ContactRecord {
    /// Saved name, then push name, then short name, then verified business name.
    pub fn display_name(&self) -> Option<&str> {
        [
            &self.name,
            &self.pushname,
            &self.short_name,
            &self.verified_name,
        ]
        .into_iter()
        .filter_map(|n| n.as_deref())
        .map(str::trim)
        .find(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}
