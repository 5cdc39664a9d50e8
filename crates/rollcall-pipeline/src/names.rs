// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display fallbacks used when a name cannot be resolved.

use std::sync::LazyLock;

use regex::Regex;

/// Label recorded when a chat has no usable group subject.
pub const UNKNOWN_GROUP: &str = "Grupo não identificado";

const USER_SUFFIXES: [&str; 2] = ["@c.us", "@s.whatsapp.net"];
const GROUP_SUFFIX: &str = "@g.us";

/// Brazilian number with country code: `55`, area code, subscriber number.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^55(\d{2})(\d{4,5})(\d{4})$").expect("phone pattern is valid")
});

/// Turn a raw user id into something a person can read.
///
/// `5511987654321@c.us` becomes `11 98765-4321`. Ids that do not look like
/// phone numbers are returned without their domain suffix.
pub fn format_user_id(user_id: &str) -> String {
    let mut bare = user_id.to_owned();
    for suffix in USER_SUFFIXES {
        bare = bare.replace(suffix, "");
    }
    PHONE.replace(&bare, "$1 $2-$3").into_owned()
}

/// Whether `chat_id` addresses a group chat.
pub fn is_group_id(chat_id: &str) -> bool {
    chat_id.ends_with(GROUP_SUFFIX)
}

/// Pick the group name to record for `chat_id`.
pub fn group_name_or_fallback(chat_id: &str, subject: Option<&str>) -> String {
    match subject.map(str::trim) {
        Some(name) if !name.is_empty() && is_group_id(chat_id) => name.to_owned(),
        _ => UNKNOWN_GROUP.to_owned(),
    }
}
