// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name lookups served by the messaging client.

use async_trait::async_trait;

use crate::error::RollcallError;

/// Display-name lookups for contacts and chats.
///
/// `Ok(None)` means the client answered but has no name on record.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// Looks up the display name of a contact.
    async fn contact_name(&self, user_id: &str) -> Result<Option<String>, RollcallError>;

    /// Looks up the subject of a group chat.
    async fn chat_name(&self, chat_id: &str) -> Result<Option<String>, RollcallError>;
}
