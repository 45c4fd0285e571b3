// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot `chat`, `pull`, `ack`, and `inbox` commands.
//!
//! Each command builds the configured stack, runs a single request, and
//! returns the JSON that `main` prints. Chats ingest directly unless
//! `queue.enabled`, in which case they are published for a running
//! `courier serve` to consume.

use std::sync::Arc;

use courier_config::model::CourierConfig;
use courier_core::protocol::{Cmd, InputPacket, OutputPacket};
use courier_core::{CourierError, TimelineStore};
use serde_json::{Value, json};

use crate::stack::Stack;

/// A chat submission from the command line.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub content: String,
    pub msg_id: Option<String>,
    pub msg_type: u8,
}

pub async fn run_chat(config: &CourierConfig, request: ChatRequest) -> Result<Value, CourierError> {
    let packet = InputPacket {
        msg_id: request.msg_id.unwrap_or_default(),
        conversation_id: request.conversation_id,
        payload: Some(json!({ "content": request.content, "msg_type": request.msg_type })),
        ..InputPacket::new(Cmd::Chat)
    };
    let stack = Stack::build(config).await?;
    let reply = dispatch(&stack, config, &request.user_id, packet).await;
    stack.close().await?;
    to_json(&reply)
}

pub async fn run_pull(
    config: &CourierConfig,
    user_id: &str,
    conversation_id: &str,
    cursor_seq: u64,
) -> Result<Value, CourierError> {
    let packet = InputPacket {
        conversation_id: conversation_id.to_string(),
        cursor_seq,
        ..InputPacket::new(Cmd::Pull)
    };
    let stack = Stack::build(config).await?;
    let reply = dispatch(&stack, config, user_id, packet).await;
    stack.close().await?;
    to_json(&reply)
}

/// Acknowledges `seq` and reports the stored cursor, which never moves back.
pub async fn run_ack(
    config: &CourierConfig,
    user_id: &str,
    conversation_id: &str,
    seq: u64,
) -> Result<Value, CourierError> {
    let packet = InputPacket {
        conversation_id: conversation_id.to_string(),
        cursor_seq: seq,
        ..InputPacket::new(Cmd::Ack)
    };
    let stack = Stack::build(config).await?;
    let reply = dispatch(&stack, config, user_id, packet).await;
    let state = if reply.is_ok() {
        stack.store.get_ack_state(user_id, conversation_id).await
    } else {
        Ok(None)
    };
    stack.close().await?;
    Ok(json!({
        "reply": to_json(&reply)?,
        "last_ack_seq": state?.map_or(0, |s| s.last_ack_seq),
    }))
}

pub async fn run_inbox(
    config: &CourierConfig,
    user_id: &str,
    after_seq: u64,
    limit: usize,
) -> Result<Value, CourierError> {
    let stack = Stack::build(config).await?;
    let entries = match &stack.inbox_reader {
        Some(reader) => reader.fetch(user_id, after_seq, limit).await,
        None => Err(CourierError::Config("inbox.backend is disabled".into())),
    };
    stack.close().await?;
    let entries = entries?;
    Ok(json!({ "user_id": user_id, "entries": entries }))
}

async fn dispatch(
    stack: &Stack,
    config: &CourierConfig,
    user_id: &str,
    packet: InputPacket,
) -> OutputPacket {
    // Inline fan-out: the process exits right after this request.
    let ingest = Arc::new(stack.ingestion(None));
    stack.dispatcher(config, ingest).handle(user_id, packet).await
}

fn to_json(packet: &OutputPacket) -> Result<Value, CourierError> {
    Ok(serde_json::to_value(packet)?)
}
