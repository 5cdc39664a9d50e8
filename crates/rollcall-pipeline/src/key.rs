// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic idempotency keys for membership events.

use sha2::{Digest, Sha256};

use rollcall_core::{EventKey, EventKind};

/// Unit separator; cannot appear in chat ids, user ids, or the decimal timestamp.
const SEPARATOR: u8 = 0x1f;

/// Derive the key of one membership change.
///
/// The key is the hex SHA-256 of the four identifying fields, so the same
/// change maps to the same key in every process and across restarts.
/// Display names are deliberately excluded: they are resolved lazily and may
/// differ between two deliveries of the same notification.
pub fn compute_key(chat_id: &str, user_id: &str, kind: EventKind, timestamp_unix: i64) -> EventKey {
    let mut hasher = Sha256::new();
    hasher.update(chat_id.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(user_id.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(kind.to_string().as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(timestamp_unix.to_string().as_bytes());
    EventKey(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        let key = compute_key("G1", "U1", EventKind::Join, 1_700_000_000);
        assert_eq!(
            key.as_str(),
            "9b86edf668daba52aa6dbf8d1925724aa513c82546e46e00ea0a2da4e054830c"
        );
    }

    #[test]
    fn kind_changes_the_key() {
        let join = compute_key("G1", "U1", EventKind::Join, 1_700_000_000);
        let leave = compute_key("G1", "U1", EventKind::Leave, 1_700_000_000);
        assert_ne!(join, leave);
        assert_eq!(
            leave.as_str(),
            "bf6e4a0cf32c700791792c14a2f2c28591f440c700674b87b5a64e669db951ee"
        );
    }

    #[test]
    fn field_boundaries_are_not_ambiguous() {
        let a = compute_key("ab", "c", EventKind::Join, 1);
        let b = compute_key("a", "bc", EventKind::Join, 1);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn same_fields_same_key(chat in "[0-9a-z@.]{1,24}", user in "[0-9a-z@.]{1,24}", ts in 1i64..4_000_000_000) {
            let first = compute_key(&chat, &user, EventKind::Leave, ts);
            let second = compute_key(&chat.clone(), &user.clone(), EventKind::Leave, ts);
            prop_assert_eq!(first.as_str().len(), 64);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn timestamp_is_part_of_the_key(ts in 1i64..4_000_000_000, delta in 1i64..86_400) {
            prop_assert_ne!(
                compute_key("G1", "U1", EventKind::Join, ts),
                compute_key("G1", "U1", EventKind::Join, ts + delta)
            );
        }
    }
}
