// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock contact and chat directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use rollcall_core::{ChatDirectory, RollcallError};

#[derive(Default)]
pub struct MockDirectory {
    contacts: Mutex<HashMap<String, String>>,
    chats: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
    silent: AtomicBool,
    lookups: AtomicU32,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, user_id: &str, name: &str) {
        if let Ok(mut contacts) = self.contacts.lock() {
            contacts.insert(user_id.to_string(), name.to_string());
        }
    }

    pub fn add_chat(&self, chat_id: &str, subject: &str) {
        if let Ok(mut chats) = self.chats.lock() {
            chats.insert(chat_id.to_string(), subject.to_string());
        }
    }

    /// Make every lookup fail, as when the messaging client is not ready.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every lookup hang without answering.
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn check(&self) -> Result<(), RollcallError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.silent.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RollcallError::Source {
                message: "mock directory unavailable".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatDirectory for MockDirectory {
    async fn contact_name(&self, user_id: &str) -> Result<Option<String>, RollcallError> {
        self.check().await?;
        Ok(self.contacts.lock().ok().and_then(|c| c.get(user_id).cloned()))
    }

    async fn chat_name(&self, chat_id: &str) -> Result<Option<String>, RollcallError> {
        self.check().await?;
        Ok(self.chats.lock().ok().and_then(|c| c.get(chat_id).cloned()))
    }
}
