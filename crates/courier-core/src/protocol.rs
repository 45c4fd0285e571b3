// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client protocol packets exchanged with the (external) transport layer.
//!
//! Packets are JSON objects. Zero-valued and empty fields are omitted on
//! output so a chat acknowledgement stays small on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success.
pub const CODE_OK: i32 = 0;
/// Generic, retryable failure.
pub const CODE_FAILURE: i32 = 1;
/// Malformed or incomplete request.
pub const CODE_BAD_REQUEST: i32 = 400;

/// Command carried by a packet, encoded as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Cmd {
    Heartbeat,
    Login,
    Chat,
    Pull,
    Ack,
    Unknown(u8),
}

impl From<u8> for Cmd {
    fn from(value: u8) -> Self {
        match value {
            0 => Cmd::Heartbeat,
            1 => Cmd::Login,
            2 => Cmd::Chat,
            3 => Cmd::Pull,
            4 => Cmd::Ack,
            other => Cmd::Unknown(other),
        }
    }
}

impl From<Cmd> for u8 {
    fn from(value: Cmd) -> Self {
        match value {
            Cmd::Heartbeat => 0,
            Cmd::Login => 1,
            Cmd::Chat => 2,
            Cmd::Pull => 3,
            Cmd::Ack => 4,
            Cmd::Unknown(other) => other,
        }
    }
}

/// A packet sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPacket {
    pub cmd: Cmd,
    /// Client-generated idempotency key for chat submissions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub conversation_id: String,
    /// Pull cursor, or the acknowledged seq for `ack`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cursor_seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl InputPacket {
    pub fn new(cmd: Cmd) -> Self {
        Self {
            cmd,
            msg_id: String::new(),
            conversation_id: String::new(),
            cursor_seq: 0,
            payload: None,
        }
    }
}

/// Chat body carried in [`InputPacket::payload`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub content: String,
    /// 1 = text, 2 = image; `0`/absent defaults to text.
    #[serde(default)]
    pub msg_type: u8,
    /// Epoch milliseconds; `0`/absent defaults to ingestion time.
    #[serde(default)]
    pub send_time: i64,
}

/// A packet sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPacket {
    pub cmd: Cmd,
    pub code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg_id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub next_cursor_seq: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutputPacket {
    /// A bare success response for `cmd`.
    pub fn ok(cmd: Cmd) -> Self {
        Self {
            cmd,
            code: CODE_OK,
            msg_id: String::new(),
            seq: 0,
            next_cursor_seq: 0,
            has_more: false,
            payload: None,
        }
    }

    /// A failure response carrying a human-readable reason.
    pub fn failure(cmd: Cmd, code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            payload: Some(Value::String(reason.into())),
            ..Self::ok(cmd)
        }
    }

    pub fn with_msg_id(mut self, msg_id: impl Into<String>) -> Self {
        self.msg_id = msg_id.into();
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_uses_integer_encoding() {
        assert_eq!(serde_json::to_string(&Cmd::Chat).unwrap(), "2");
        let parsed: Cmd = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, Cmd::Pull);
        let unknown: Cmd = serde_json::from_str("42").unwrap();
        assert_eq!(unknown, Cmd::Unknown(42));
    }

    #[test]
    fn input_packet_parses_minimal_chat() {
        let json = r#"{"cmd":2,"conversation_id":"private_u1_u2","payload":{"content":"hi"}}"#;
        let packet: InputPacket = serde_json::from_str(json).unwrap();
        assert_eq!(packet.cmd, Cmd::Chat);
        assert!(packet.msg_id.is_empty());
        assert_eq!(packet.cursor_seq, 0);

        let payload: ChatPayload = serde_json::from_value(packet.payload.unwrap()).unwrap();
        assert_eq!(payload.content, "hi");
        assert_eq!(payload.msg_type, 0);
        assert_eq!(payload.send_time, 0);
    }

    #[test]
    fn output_packet_omits_empty_fields() {
        let packet = OutputPacket::ok(Cmd::Ack);
        assert_eq!(serde_json::to_string(&packet).unwrap(), r#"{"cmd":4,"code":0}"#);

        let chat = OutputPacket::ok(Cmd::Chat).with_msg_id("m1").with_seq(1);
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["msg_id"], "m1");
        assert_eq!(json["seq"], 1);
        assert!(json.get("has_more").is_none());
    }

    #[test]
    fn failure_carries_reason() {
        let packet = OutputPacket::failure(Cmd::Chat, CODE_BAD_REQUEST, "conversation_id is required");
        assert!(!packet.is_ok());
        assert_eq!(
            packet.payload,
            Some(Value::String("conversation_id is required".into()))
        );
    }
}
