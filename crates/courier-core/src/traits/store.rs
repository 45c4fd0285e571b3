// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable timeline storage traits.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::backend::Backend;
use crate::types::{TimelineMessage, UserConversationState};

/// Idempotent persistence of timeline messages.
#[async_trait]
pub trait MessageStore: Backend {
    /// Persists `msg` and returns its seq.
    ///
    /// When `msg.seq` is `0` the store assigns the next seq for the
    /// conversation inside the insert transaction. A `msg_id` that already
    /// exists yields [`CourierError::DuplicateMsgId`]; any other failure,
    /// including a `(conversation_id, seq)` collision, is a
    /// [`CourierError::Storage`].
    async fn save_message(&self, msg: &TimelineMessage) -> Result<u64, CourierError>;

    /// Looks up a message by its idempotency key.
    async fn find_by_msg_id(&self, msg_id: &str) -> Result<Option<TimelineMessage>, CourierError>;
}

/// Cursor reads over the timeline and acknowledgement bookkeeping.
#[async_trait]
pub trait TimelineStore: Backend {
    /// Returns up to `limit` messages with `seq > after_seq`, ascending.
    async fn list_messages(
        &self,
        conversation_id: &str,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<TimelineMessage>, CourierError>;

    /// Records `ack_seq` unless the stored cursor is already larger.
    async fn upsert_ack(
        &self,
        user_id: &str,
        conversation_id: &str,
        ack_seq: u64,
    ) -> Result<(), CourierError>;

    /// Returns the stored acknowledgement cursor, if any.
    async fn get_ack_state(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<UserConversationState>, CourierError>;
}
