// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic-counter sequence generator on Redis `INCR`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use courier_core::types::{BackendKind, HealthStatus};
use courier_core::{Backend, CourierError, SeqGenerator};

/// Per-conversation counter at `{key_prefix}{conversation_id}`.
///
/// Values are strictly increasing and never repeat while the key survives.
/// A value whose message is never saved leaves a gap.
#[derive(Clone)]
pub struct RedisCounterSeq {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisCounterSeq {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.key_prefix, conversation_id)
    }
}

#[async_trait]
impl Backend for RedisCounterSeq {
    fn name(&self) -> &str {
        "redis-counter"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sequence
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(crate::ping(&self.conn).await)
    }
}

#[async_trait]
impl SeqGenerator for RedisCounterSeq {
    async fn next_seq(&self, conversation_id: &str) -> Result<u64, CourierError> {
        if conversation_id.is_empty() {
            return Err(CourierError::InvalidArgument(
                "conversation_id is required".to_string(),
            ));
        }
        let mut conn = self.conn.clone();
        let value = redis::cmd("INCR")
            .arg(self.key(conversation_id))
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(CourierError::cache)?;
        u64::try_from(value).map_err(|_| CourierError::Cache {
            source: format!("counter for `{conversation_id}` went negative: {value}").into(),
        })
    }
}
