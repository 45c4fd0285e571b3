// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, cache, and pipeline crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Default row status for a freshly persisted message.
pub const STATUS_NORMAL: u8 = 1;

/// Kind of message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MsgType {
    #[default]
    Text,
    Image,
}

impl MsgType {
    /// Resolves a wire value, treating `0` (unset) as text.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 | 1 => Some(MsgType::Text),
            2 => Some(MsgType::Image),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            MsgType::Text => 1,
            MsgType::Image => 2,
        }
    }
}

impl From<MsgType> for u8 {
    fn from(value: MsgType) -> Self {
        value.as_u8()
    }
}

impl TryFrom<u8> for MsgType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MsgType::from_wire(value).ok_or_else(|| format!("unknown msg_type {value}"))
    }
}

/// One chat message in a conversation's history.
///
/// `seq` is `0` until the message has been ordered, either by a
/// [`SeqGenerator`](crate::SeqGenerator) before the save or by the store
/// itself during the insert. Once persisted the row is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineMessage {
    pub msg_id: String,
    pub conversation_id: String,
    pub seq: u64,
    pub sender_id: String,
    pub content: String,
    pub msg_type: MsgType,
    pub status: u8,
    /// Epoch milliseconds.
    pub send_time: i64,
}

/// Per (user, conversation) acknowledgement cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConversationState {
    pub user_id: String,
    pub conversation_id: String,
    pub last_ack_seq: u64,
    pub updated_at: String,
}

/// Compact projection of a [`TimelineMessage`] kept in a recipient's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub msg_id: String,
    pub conversation_id: String,
    pub seq: u64,
    pub sender_id: String,
    pub content: String,
    pub msg_type: MsgType,
    pub send_time: i64,
}

impl From<&TimelineMessage> for InboxEntry {
    fn from(msg: &TimelineMessage) -> Self {
        Self {
            msg_id: msg.msg_id.clone(),
            conversation_id: msg.conversation_id.clone(),
            seq: msg.seq,
            sender_id: msg.sender_id.clone(),
            content: msg.content.clone(),
            msg_type: msg.msg_type,
            send_time: msg.send_time,
        }
    }
}

/// Queue-wire representation of a chat submission.
///
/// Carries exactly what is needed to replay ingestion after decoupling.
/// `msg_type` and `send_time` keep their raw wire values so the replay
/// applies the same defaulting as a direct submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub msg_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub msg_type: u8,
    #[serde(default)]
    pub send_time: i64,
}

/// Health status reported by backend health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Backend is fully operational.
    Healthy,
    /// Backend is operational but experiencing issues.
    Degraded(String),
    /// Backend is not operational.
    Unhealthy(String),
}

/// Identifies which capability a backend provides.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum BackendKind {
    Store,
    Sequence,
    Inbox,
    Queue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_defaults_unset_to_text() {
        assert_eq!(MsgType::from_wire(0), Some(MsgType::Text));
        assert_eq!(MsgType::from_wire(1), Some(MsgType::Text));
        assert_eq!(MsgType::from_wire(2), Some(MsgType::Image));
        assert_eq!(MsgType::from_wire(7), None);
    }

    #[test]
    fn msg_type_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&MsgType::Image).unwrap(), "2");
        let parsed: MsgType = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, MsgType::Text);
        assert!(serde_json::from_str::<MsgType>("9").is_err());
    }

    #[test]
    fn inbox_entry_projects_timeline_fields() {
        let msg = TimelineMessage {
            msg_id: "m1".into(),
            conversation_id: "private_u1_u2".into(),
            seq: 4,
            sender_id: "u1".into(),
            content: "hi".into(),
            msg_type: MsgType::Text,
            status: STATUS_NORMAL,
            send_time: 1_700_000_000_000,
        };
        let entry = InboxEntry::from(&msg);
        assert_eq!(entry.seq, 4);
        assert_eq!(entry.msg_id, "m1");
        assert_eq!(entry.send_time, msg.send_time);
    }

    #[test]
    fn chat_event_tolerates_missing_optional_fields() {
        let json = r#"{"msg_id":"m1","conversation_id":"c","sender_id":"u1","content":"x"}"#;
        let evt: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(evt.msg_type, 0);
        assert_eq!(evt.send_time, 0);
    }
}
