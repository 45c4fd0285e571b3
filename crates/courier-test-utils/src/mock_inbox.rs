// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox backend with injectable append failures.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_cache::MemoryInbox;
use courier_core::types::{BackendKind, HealthStatus, InboxEntry, TimelineMessage};
use courier_core::{Backend, CourierError, InboxReader, InboxWriter};

/// Wraps a [`MemoryInbox`]; the first `failures` appends return an error.
pub struct FlakyInbox {
    inner: MemoryInbox,
    failures: u32,
    calls: AtomicU32,
    successes: AtomicU32,
}

impl FlakyInbox {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryInbox::new(Duration::from_secs(3600)),
            failures,
            calls: AtomicU32::new(0),
            successes: AtomicU32::new(0),
        }
    }

    /// An inbox that never fails.
    pub fn reliable() -> Self {
        Self::new(0)
    }

    /// Total append attempts, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn len(&self, user_id: &str) -> usize {
        self.inner.len(user_id)
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.inner.is_empty(user_id)
    }
}

#[async_trait]
impl Backend for FlakyInbox {
    fn name(&self) -> &str {
        "flaky-inbox"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Inbox
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl InboxWriter for FlakyInbox {
    async fn append(
        &self,
        msg: &TimelineMessage,
        recipients: &[String],
    ) -> Result<(), CourierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(CourierError::cache(std::io::Error::other(format!(
                "injected inbox failure {}",
                call + 1
            ))));
        }
        self.inner.append(msg, recipients).await?;
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl InboxReader for FlakyInbox {
    async fn fetch(
        &self,
        user_id: &str,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<InboxEntry>, CourierError> {
        self.inner.fetch(user_id, after_seq, limit).await
    }
}
