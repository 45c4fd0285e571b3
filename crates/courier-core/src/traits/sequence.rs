// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation sequence number generation.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::backend::Backend;

/// Produces strictly increasing positions within a conversation.
///
/// Implementations must return a value greater than any value previously
/// returned or persisted for the conversation, across processes. Gaps are
/// allowed; repeats are not. A deployment picks one implementation and
/// keeps it: two generators are not aware of each other.
#[async_trait]
pub trait SeqGenerator: Backend {
    async fn next_seq(&self, conversation_id: &str) -> Result<u64, CourierError>;
}
