// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process directory fed by the bridge's contact and chat records.

use async_trait::async_trait;
use dashmap::DashMap;

use rollcall_core::{ChatDirectory, RollcallError};

use crate::records::{ChatRecord, ContactRecord};

#[derive(Debug, Default)]
pub struct BridgeDirectory {
    contacts: DashMap<String, String>,
    chats: DashMap<String, String>,
}

impl BridgeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the contact's preferred display name. A record without any
    /// name clears a previously known one.
    pub fn apply_contact(&self, record: &ContactRecord) {
        match record.display_name() {
            Some(name) => {
                self.contacts.insert(record.id.clone(), name.to_string());
            }
            None => {
                self.contacts.remove(&record.id);
            }
        }
    }

    pub fn apply_chat(&self, record: &ChatRecord) {
        match record.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                self.chats.insert(record.id.clone(), name.to_string());
            }
            None => {
                self.chats.remove(&record.id);
            }
        }
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }
}

#[async_trait]
impl ChatDirectory for BridgeDirectory {
    async fn contact_name(&self, user_id: &str) -> Result<Option<String>, RollcallError> {
        Ok(self.contacts.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn chat_name(&self, chat_id: &str) -> Result<Option<String>, RollcallError> {
        Ok(self.chats.get(chat_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_update_lookups() {
        let dir = BridgeDirectory::new();
        dir.apply_contact(&ContactRecord {
            id: "U1".into(),
            pushname: Some("Alice".into()),
            ..ContactRecord::default()
        });
        dir.apply_chat(&ChatRecord {
            id: "1203@g.us".into(),
            name: Some("Turma A".into()),
            is_group: true,
        });

        assert_eq!(dir.contact_name("U1").await.unwrap().as_deref(), Some("Alice"));
        assert_eq!(dir.chat_name("1203@g.us").await.unwrap().as_deref(), Some("Turma A"));
        assert_eq!(dir.contact_name("U2").await.unwrap(), None);

        dir.apply_contact(&ContactRecord {
            id: "U1".into(),
            ..ContactRecord::default()
        });
        assert_eq!(dir.contact_name("U1").await.unwrap(), None);
        assert_eq!(dir.contact_count(), 0);
        assert_eq!(dir.chat_count(), 1);
    }
}
