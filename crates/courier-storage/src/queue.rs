// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable event queue on the `queue` table.

use std::time::Duration;

use async_trait::async_trait;

use courier_config::model::QueueConfig;
use courier_core::types::{BackendKind, HealthStatus};
use courier_core::{Backend, CourierError, Delivery, EventQueue, RequeueOutcome};

use crate::database::Database;
use crate::queries;

/// [`EventQueue`] over SQLite. Entries survive restarts; a claimed entry is
/// invisible to other consumers until it is settled or its lock expires.
#[derive(Clone)]
pub struct SqliteQueue {
    db: Database,
    max_attempts: u32,
    visibility_timeout: Duration,
}

impl SqliteQueue {
    pub fn new(db: Database, max_attempts: u32, visibility_timeout: Duration) -> Self {
        Self {
            db,
            max_attempts: max_attempts.max(1),
            visibility_timeout,
        }
    }

    pub fn from_config(db: Database, config: &QueueConfig) -> Self {
        Self::new(
            db,
            config.max_delivery_attempts,
            Duration::from_secs(config.visibility_timeout_secs),
        )
    }

    /// Entries of `queue_name` waiting for delivery.
    pub async fn pending_count(&self, queue_name: &str) -> Result<u64, CourierError> {
        queries::queue::count_with_status(&self.db, queue_name, "pending").await
    }

    /// Entries of `queue_name` that exhausted their delivery attempts.
    pub async fn dead_letter_count(&self, queue_name: &str) -> Result<u64, CourierError> {
        queries::queue::count_with_status(&self.db, queue_name, "failed").await
    }
}

#[async_trait]
impl Backend for SqliteQueue {
    fn name(&self) -> &str {
        "sqlite-queue"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Queue
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        queries::queue::get_entry(&self.db, 0).await?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl EventQueue for SqliteQueue {
    async fn publish(
        &self,
        queue_name: &str,
        message_id: &str,
        payload: &str,
    ) -> Result<i64, CourierError> {
        let message_id = (!message_id.is_empty()).then_some(message_id);
        queries::queue::enqueue(&self.db, queue_name, message_id, payload, self.max_attempts).await
    }

    async fn next_delivery(&self, queue_name: &str) -> Result<Option<Delivery>, CourierError> {
        let entry =
            queries::queue::dequeue(&self.db, queue_name, self.visibility_timeout.as_secs())
                .await?;
        Ok(entry.map(Delivery::from))
    }

    async fn ack(&self, id: i64) -> Result<(), CourierError> {
        queries::queue::ack(&self.db, id).await
    }

    async fn requeue(&self, id: i64) -> Result<RequeueOutcome, CourierError> {
        queries::queue::requeue(&self.db, id).await
    }

    async fn reject(&self, id: i64) -> Result<(), CourierError> {
        queries::queue::reject(&self.db, id).await
    }
}
