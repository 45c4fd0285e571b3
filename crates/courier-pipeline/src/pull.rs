// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cursor-based history pulls and read acknowledgements.

use std::sync::Arc;

use courier_config::model::ServiceConfig;
use courier_core::protocol::{Cmd, OutputPacket};
use courier_core::types::TimelineMessage;
use courier_core::{CourierError, TimelineStore};
use serde_json::json;

const DEFAULT_PULL_LIMIT: usize = 50;
const MAX_PULL_LIMIT: usize = 200;

/// One page of a conversation's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullPage {
    pub messages: Vec<TimelineMessage>,
    /// Seq of the last returned message, or the request cursor when empty.
    pub next_cursor_seq: u64,
    pub has_more: bool,
}

impl PullPage {
    pub fn to_packet(&self) -> Result<OutputPacket, CourierError> {
        let mut packet = OutputPacket::ok(Cmd::Pull)
            .with_payload(json!({ "messages": serde_json::to_value(&self.messages)? }));
        packet.next_cursor_seq = self.next_cursor_seq;
        packet.has_more = self.has_more;
        Ok(packet)
    }
}

pub struct PullService {
    store: Arc<dyn TimelineStore>,
    default_limit: usize,
    max_limit: usize,
}

impl PullService {
    pub fn new(store: Arc<dyn TimelineStore>) -> Self {
        Self {
            store,
            default_limit: DEFAULT_PULL_LIMIT,
            max_limit: MAX_PULL_LIMIT,
        }
    }

    pub fn from_config(store: Arc<dyn TimelineStore>, config: &ServiceConfig) -> Self {
        Self::new(store).with_limits(config.pull_default_limit, config.pull_max_limit)
    }

    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_limit = default_limit.max(1);
        self.max_limit = max_limit.max(self.default_limit);
        self
    }

    /// Messages after `cursor_seq`, at most `limit` (0 means the default).
    ///
    /// Fetches one row past the limit to learn whether more remain.
    pub async fn pull_messages(
        &self,
        conversation_id: &str,
        cursor_seq: u64,
        limit: usize,
    ) -> Result<PullPage, CourierError> {
        let limit = if limit == 0 {
            self.default_limit
        } else {
            limit.min(self.max_limit)
        };
        let mut messages = self
            .store
            .list_messages(conversation_id, cursor_seq, limit + 1)
            .await?;

        let has_more = messages.len() > limit;
        messages.truncate(limit);
        let next_cursor_seq = messages.last().map_or(cursor_seq, |m| m.seq);
        Ok(PullPage {
            messages,
            next_cursor_seq,
            has_more,
        })
    }

    /// Advances the user's read cursor; older acks never move it back.
    pub async fn ack_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        ack_seq: u64,
    ) -> Result<(), CourierError> {
        self.store.upsert_ack(user_id, conversation_id, ack_seq).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_config::model::StorageConfig;
    use courier_core::types::{MsgType, STATUS_NORMAL};
    use courier_core::MessageStore;
    use courier_storage::SqliteStore;
    use tempfile::tempdir;

    async fn seeded_store(count: u64) -> (Arc<SqliteStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(StorageConfig {
            database_path: dir.path().join("pull.db").to_string_lossy().to_string(),
            ..StorageConfig::default()
        });
        store.initialize().await.unwrap();
        for i in 1..=count {
            store
                .save_message(&TimelineMessage {
                    msg_id: format!("m{i}"),
                    conversation_id: "C".into(),
                    seq: 0,
                    sender_id: "u1".into(),
                    content: format!("#{i}"),
                    msg_type: MsgType::Text,
                    status: STATUS_NORMAL,
                    send_time: 1,
                })
                .await
                .unwrap();
        }
        (Arc::new(store), dir)
    }

    fn seqs(page: &PullPage) -> Vec<u64> {
        page.messages.iter().map(|m| m.seq).collect()
    }

    #[tokio::test]
    async fn pull_boundary_with_one_extra_row() {
        let (store, _dir) = seeded_store(3).await;
        let pull = PullService::new(store);

        let first = pull.pull_messages("C", 0, 2).await.unwrap();
        assert_eq!(seqs(&first), vec![1, 2]);
        assert_eq!(first.next_cursor_seq, 2);
        assert!(first.has_more);

        let second = pull.pull_messages("C", 2, 2).await.unwrap();
        assert_eq!(seqs(&second), vec![3]);
        assert_eq!(second.next_cursor_seq, 3);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn exact_page_has_no_more() {
        let (store, _dir) = seeded_store(2).await;
        let page = PullService::new(store).pull_messages("C", 0, 2).await.unwrap();
        assert_eq!(seqs(&page), vec![1, 2]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn empty_page_keeps_cursor() {
        let (store, _dir) = seeded_store(3).await;
        let page = PullService::new(store).pull_messages("C", 3, 10).await.unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.next_cursor_seq, 3);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn zero_limit_uses_default_and_large_limit_is_clamped() {
        let (store, _dir) = seeded_store(6).await;
        let pull = PullService::new(store).with_limits(4, 5);

        let page = pull.pull_messages("C", 0, 0).await.unwrap();
        assert_eq!(page.messages.len(), 4);
        assert!(page.has_more);

        let page = pull.pull_messages("C", 0, 1000).await.unwrap();
        assert_eq!(page.messages.len(), 5);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn empty_conversation_is_invalid() {
        let (store, _dir) = seeded_store(0).await;
        let err = PullService::new(store).pull_messages("", 0, 10).await.unwrap_err();
        assert!(matches!(err, CourierError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn ack_never_regresses() {
        let (store, _dir) = seeded_store(0).await;
        let pull = PullService::new(store.clone());

        pull.ack_conversation("u", "C", 5).await.unwrap();
        pull.ack_conversation("u", "C", 3).await.unwrap();
        let state = store.get_ack_state("u", "C").await.unwrap().unwrap();
        assert_eq!(state.last_ack_seq, 5);
    }

    #[test]
    fn page_packet_carries_cursor_and_messages() {
        let page = PullPage {
            messages: Vec::new(),
            next_cursor_seq: 7,
            has_more: true,
        };
        let packet = page.to_packet().unwrap();
        assert_eq!(packet.cmd, Cmd::Pull);
        assert_eq!(packet.next_cursor_seq, 7);
        assert!(packet.has_more);
        assert_eq!(packet.payload.unwrap()["messages"], json!([]));
    }
}
