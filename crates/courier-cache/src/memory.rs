// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process counters and inboxes.
//!
//! State lives only as long as the process. Suitable for single-node
//! deployments and tests; the inbox mirrors the Redis layout, including
//! the sliding TTL.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use courier_core::types::{BackendKind, HealthStatus, InboxEntry, TimelineMessage};
use courier_core::{Backend, CourierError, InboxReader, InboxWriter, SeqGenerator};

/// Atomic-counter strategy in memory.
#[derive(Clone, Default)]
pub struct MemoryCounterSeq {
    counters: Arc<DashMap<String, u64>>,
}

impl MemoryCounterSeq {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryCounterSeq {
    fn name(&self) -> &str {
        "memory-counter"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sequence
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl SeqGenerator for MemoryCounterSeq {
    async fn next_seq(&self, conversation_id: &str) -> Result<u64, CourierError> {
        if conversation_id.is_empty() {
            return Err(CourierError::InvalidArgument(
                "conversation_id is required".to_string(),
            ));
        }
        let mut counter = self.counters.entry(conversation_id.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

struct UserInbox {
    /// Ordered by (seq, msg_id), matching sorted-set score then member order.
    entries: BTreeMap<(u64, String), InboxEntry>,
    expires_at: Instant,
}

/// Per-recipient inbox in memory with a sliding TTL.
///
/// Expired inboxes are swept from `append` at most once per TTL, so
/// recipients nobody reads do not accumulate.
#[derive(Clone)]
pub struct MemoryInbox {
    inboxes: Arc<DashMap<String, UserInbox>>,
    ttl: Duration,
    last_sweep: Arc<Mutex<Instant>>,
}

impl MemoryInbox {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inboxes: Arc::new(DashMap::new()),
            ttl,
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Recipients currently tracked, expired or not.
    pub fn inbox_count(&self) -> usize {
        self.inboxes.len()
    }

    fn sweep_expired(&self, now: Instant) {
        // A sweep already running elsewhere covers this call.
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < self.ttl {
            return;
        }
        *last_sweep = now;
        let before = self.inboxes.len();
        self.inboxes.retain(|_, inbox| inbox.expires_at > now);
        let evicted = before.saturating_sub(self.inboxes.len());
        if evicted > 0 {
            debug!(evicted, "swept expired inboxes");
        }
    }

    /// Number of live entries for `user_id`.
    pub fn len(&self, user_id: &str) -> usize {
        let now = Instant::now();
        self.inboxes
            .get(user_id)
            .filter(|inbox| inbox.expires_at > now)
            .map(|inbox| inbox.entries.len())
            .unwrap_or(0)
    }

    /// True when `user_id` has no live entries.
    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }
}

#[async_trait]
impl Backend for MemoryInbox {
    fn name(&self) -> &str {
        "memory-inbox"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Inbox
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl InboxWriter for MemoryInbox {
    async fn append(
        &self,
        msg: &TimelineMessage,
        recipients: &[String],
    ) -> Result<(), CourierError> {
        let now = Instant::now();
        self.sweep_expired(now);
        let expires_at = now + self.ttl;
        let entry = InboxEntry::from(msg);
        for user_id in recipients.iter().filter(|u| !u.is_empty()) {
            let mut inbox = self
                .inboxes
                .entry(user_id.clone())
                .or_insert_with(|| UserInbox {
                    entries: BTreeMap::new(),
                    expires_at,
                });
            if inbox.expires_at <= now {
                inbox.entries.clear();
            }
            inbox
                .entries
                .insert((entry.seq, entry.msg_id.clone()), entry.clone());
            inbox.expires_at = expires_at;
        }
        Ok(())
    }
}

#[async_trait]
impl InboxReader for MemoryInbox {
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
        let Some(start) = after_seq.checked_add(1) else {
            return Ok(Vec::new());
        };
        let now = Instant::now();
        match self.inboxes.get(user_id) {
            None => return Ok(Vec::new()),
            Some(inbox) if inbox.expires_at > now => {
                return Ok(inbox
                    .entries
                    .range((start, String::new())..)
                    .map(|(_, entry)| entry.clone())
                    .take(limit)
                    .collect());
            }
            Some(_) => {}
        }
        self.inboxes
            .remove_if(user_id, |_, inbox| inbox.expires_at <= now);
        Ok(Vec::new())
    }
}
