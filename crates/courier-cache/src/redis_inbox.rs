// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient inboxes as Redis sorted sets.
//!
//! Each recipient owns `{key_prefix}{user_id}`, scored by seq with the JSON
//! [`InboxEntry`] as member. Every append refreshes the key's TTL.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::warn;

use courier_core::types::{BackendKind, HealthStatus, InboxEntry, TimelineMessage};
use courier_core::{Backend, CourierError, InboxReader, InboxWriter};

#[derive(Clone)]
pub struct RedisInbox {
    conn: MultiplexedConnection,
    key_prefix: String,
    ttl: Duration,
}

impl RedisInbox {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl Backend for RedisInbox {
    fn name(&self) -> &str {
        "redis-inbox"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Inbox
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(crate::ping(&self.conn).await)
    }
}

#[async_trait]
impl InboxWriter for RedisInbox {
    async fn append(
        &self,
        msg: &TimelineMessage,
        recipients: &[String],
    ) -> Result<(), CourierError> {
        if recipients.is_empty() {
            return Ok(());
        }
        let member = serde_json::to_string(&InboxEntry::from(msg))?;
        let ttl_secs = self.ttl.as_secs().max(1);

        let mut pipe = redis::pipe();
        pipe.atomic();
        for user_id in recipients.iter().filter(|u| !u.is_empty()) {
            let key = self.key(user_id);
            pipe.cmd("ZADD")
                .arg(&key)
                .arg(msg.seq)
                .arg(&member)
                .ignore()
                .cmd("EXPIRE")
                .arg(&key)
                .arg(ttl_secs)
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(CourierError::cache)
    }
}

#[async_trait]
impl InboxReader for RedisInbox {
    async fn fetch(
        &self,
        user_id: &str,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<InboxEntry>, CourierError> {
        if user_id.is_empty() {
            return Err(CourierError::InvalidArgument(
                "user_id is required".to_string(),
            ));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let members = redis::cmd("ZRANGEBYSCORE")
            .arg(self.key(user_id))
            .arg(format!("({after_seq}"))
            .arg("+inf")
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async::<_, Vec<String>>(&mut conn)
            .await
            .map_err(CourierError::cache)?;

        let mut entries = Vec::with_capacity(members.len());
        for member in members {
            match serde_json::from_str::<InboxEntry>(&member) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(user_id, error = %e, "skipping undecodable inbox entry"),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{redis_url, unique_prefix};
    use courier_core::types::{MsgType, STATUS_NORMAL};

    fn message(msg_id: &str, seq: u64) -> TimelineMessage {
        TimelineMessage {
            msg_id: msg_id.to_string(),
            conversation_id: "private_a_b".to_string(),
            seq,
            sender_id: "a".to_string(),
            content: format!("body {msg_id}"),
            msg_type: MsgType::Text,
            status: STATUS_NORMAL,
            send_time: 1,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (COURIER_TEST_REDIS_URL)"]
    async fn append_then_fetch_in_seq_order() {
        let conn = crate::connect(&redis_url()).await.unwrap();
        let inbox = RedisInbox::new(conn, unique_prefix("inbox"), Duration::from_secs(60));
        let recipients = vec!["a".to_string(), "b".to_string()];

        inbox.append(&message("m2", 2), &recipients).await.unwrap();
        inbox.append(&message("m1", 1), &recipients).await.unwrap();
        // Replaying the same message does not duplicate it.
        inbox.append(&message("m1", 1), &recipients).await.unwrap();

        let all = inbox.fetch("b", 0, 10).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.msg_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);

        let after = inbox.fetch("a", 1, 10).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].seq, 2);

        assert!(inbox.fetch("nobody", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (COURIER_TEST_REDIS_URL)"]
    async fn append_sets_ttl() {
        let conn = crate::connect(&redis_url()).await.unwrap();
        let prefix = unique_prefix("inbox");
        let inbox = RedisInbox::new(conn.clone(), prefix.clone(), Duration::from_secs(120));

        inbox.append(&message("m1", 1), &["b".to_string()]).await.unwrap();

        let mut conn = conn;
        let ttl = redis::cmd("TTL")
            .arg(format!("{prefix}b"))
            .query_async::<_, i64>(&mut conn)
            .await
            .unwrap();
        assert!(ttl > 0 && ttl <= 120, "ttl was {ttl}");
    }
}
