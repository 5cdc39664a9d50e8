// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display-name lookups that never fail.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use rollcall_core::ChatDirectory;
use rollcall_resilience::RetryPolicy;

use crate::names::{format_user_id, group_name_or_fallback};

/// Upper bound on resolving both names of one event.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Resolves user and group names through a [`ChatDirectory`], falling back
/// to formatted ids when the directory is absent, errors, or has no entry.
pub struct NameResolver {
    directory: Option<Arc<dyn ChatDirectory>>,
    policy: RetryPolicy,
    deadline: Duration,
}

impl NameResolver {
    pub fn new(directory: Option<Arc<dyn ChatDirectory>>, policy: RetryPolicy) -> Self {
        Self {
            directory,
            policy,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Resolver that never consults a directory.
    pub fn offline() -> Self {
        Self::new(None, RetryPolicy::none())
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Both names for one event, looked up concurrently.
    ///
    /// A directory that has not answered within the deadline yields the
    /// formatted ids for both.
    pub async fn resolve(&self, user_id: &str, chat_id: &str) -> (String, String) {
        let lookups = async {
            tokio::join!(
                self.resolve_user_name(user_id),
                self.resolve_group_name(chat_id)
            )
        };
        match tokio::time::timeout(self.deadline, lookups).await {
            Ok(names) => names,
            Err(_) => {
                warn!(
                    user_id,
                    chat_id,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "name lookup timed out, using formatted ids"
                );
                (
                    format_user_id(user_id),
                    group_name_or_fallback(chat_id, None),
                )
            }
        }
    }

    pub async fn resolve_user_name(&self, user_id: &str) -> String {
        let Some(directory) = &self.directory else {
            return format_user_id(user_id);
        };
        let attempted = self
            .policy
            .run(|_| directory.contact_name(user_id), |_| true)
            .await;
        match attempted.result {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => {
                debug!(user_id, "contact has no name, using formatted id");
                format_user_id(user_id)
            }
            Err(e) => {
                warn!(user_id, attempts = attempted.attempts, error = %e, "contact lookup failed");
                format_user_id(user_id)
            }
        }
    }

    pub async fn resolve_group_name(&self, chat_id: &str) -> String {
        let Some(directory) = &self.directory else {
            return group_name_or_fallback(chat_id, None);
        };
        let attempted = self
            .policy
            .run(|_| directory.chat_name(chat_id), |_| true)
            .await;
        match attempted.result {
            Ok(subject) => group_name_or_fallback(chat_id, subject.as_deref()),
            Err(e) => {
                warn!(chat_id, attempts = attempted.attempts, error = %e, "chat lookup failed");
                group_name_or_fallback(chat_id, None)
            }
        }
    }
}
