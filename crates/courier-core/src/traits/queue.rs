// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable event queue used to decouple chat ingestion.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::backend::Backend;

/// A claimed queue entry awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: i64,
    pub queue_name: String,
    /// Tag set by the publisher (the chat `msg_id`).
    pub message_id: Option<String>,
    pub payload: String,
    /// Previous failed processing attempts.
    pub attempts: u32,
}

/// Result of a negative acknowledgement with requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// The entry will be delivered again.
    Pending { attempts: u32 },
    /// The entry exhausted its delivery attempts and will not return.
    DeadLettered { attempts: u32 },
}

/// At-least-once queue with explicit acknowledgement.
#[async_trait]
pub trait EventQueue: Backend {
    /// Durably stores `payload`, returning the entry id.
    async fn publish(
        &self,
        queue_name: &str,
        message_id: &str,
        payload: &str,
    ) -> Result<i64, CourierError>;

    /// Claims the next deliverable entry, or `None` when the queue is idle.
    async fn next_delivery(&self, queue_name: &str) -> Result<Option<Delivery>, CourierError>;

    /// Positive acknowledgement: the entry is done.
    async fn ack(&self, id: i64) -> Result<(), CourierError>;

    /// Negative acknowledgement: the entry may succeed on redelivery.
    async fn requeue(&self, id: i64) -> Result<RequeueOutcome, CourierError>;

    /// Permanent rejection: the entry can never succeed and is discarded.
    async fn reject(&self, id: i64) -> Result<(), CourierError>;
}
