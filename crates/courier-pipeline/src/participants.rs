// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient derivation for two-party conversations.

const PRIVATE_PREFIX: &str = "private_";

/// Recipients of a message in a `private_<a>_<b>` conversation.
///
/// Returns the distinct non-empty participant ids in the order they appear,
/// followed by `sender_id` when it is not among them. Conversations that do
/// not follow the convention, or name fewer than two segments, have no
/// recipients.
pub fn private_participants(conversation_id: &str, sender_id: &str) -> Vec<String> {
    let Some(rest) = conversation_id.strip_prefix(PRIVATE_PREFIX) else {
        return Vec::new();
    };
    let parts: Vec<&str> = rest.split('_').collect();
    if parts.len() < 2 {
        return Vec::new();
    }

    let mut users: Vec<String> = Vec::with_capacity(parts.len() + 1);
    for part in parts {
        if part.is_empty() || users.iter().any(|u| u == part) {
            continue;
        }
        users.push(part.to_string());
    }
    if !sender_id.is_empty() && !users.iter().any(|u| u == sender_id) {
        users.push(sender_id.to_string());
    }
    users
}
