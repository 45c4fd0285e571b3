// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequence generator backed by the durable store.

use async_trait::async_trait;

use courier_core::types::{BackendKind, HealthStatus};
use courier_core::{Backend, CourierError, SeqGenerator};

use crate::database::Database;
use crate::queries;

/// Locked-max strategy: each value is derived from the current maximum
/// under a `BEGIN IMMEDIATE` write lock.
///
/// Reservations are recorded, so a value handed out for a message whose
/// save later failed is never reused. Values from this generator and seqs
/// assigned by [`SqliteStore`](crate::SqliteStore) on save come from the
/// same reservation and never collide.
#[derive(Clone)]
pub struct LockedMaxSeq {
    db: Database,
}

impl LockedMaxSeq {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Backend for LockedMaxSeq {
    fn name(&self) -> &str {
        "sqlite-locked-max"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sequence
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        queries::sequence::last_reserved(&self.db, "").await?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl SeqGenerator for LockedMaxSeq {
    async fn next_seq(&self, conversation_id: &str) -> Result<u64, CourierError> {
        if conversation_id.is_empty() {
            return Err(CourierError::InvalidArgument(
                "conversation_id is required".to_string(),
            ));
        }
        queries::sequence::next_seq(&self.db, conversation_id).await
    }
}
