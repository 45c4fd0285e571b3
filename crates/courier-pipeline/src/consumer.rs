// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replays queued chat events through ingestion.
//!
//! Delivery is at-least-once; duplicate `msg_id` handling in
//! [`IngestionService`] collapses redeliveries into one stored row.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::QueueConfig;
use courier_core::types::ChatEvent;
use courier_core::{CourierError, Delivery, EventQueue, RequeueOutcome};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::IngestError;
use crate::ingest::IngestionService;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Ingested (or resolved as a duplicate) and acknowledged.
    Acked,
    /// Ingestion failed; the entry goes back to the queue or dead-letters.
    Requeued(RequeueOutcome),
    /// The entry can never succeed and was discarded.
    Rejected,
}

pub struct MessageConsumer {
    queue: Arc<dyn EventQueue>,
    ingest: Arc<IngestionService>,
    queue_name: String,
    handle_timeout: Duration,
    poll_interval: Duration,
    workers: usize,
}

impl MessageConsumer {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        ingest: Arc<IngestionService>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            queue,
            ingest,
            queue_name: config.queue_name.clone(),
            handle_timeout: Duration::from_millis(config.consumer_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            workers: config.workers.max(1),
        }
    }

    /// Settles one delivery.
    ///
    /// Undecodable payloads and invalid events are rejected. A failed or
    /// timed-out ingestion is requeued. Errors are returned only when the
    /// queue itself cannot record the settlement.
    pub async fn process(&self, delivery: Delivery) -> Result<DeliveryOutcome, CourierError> {
        let event: ChatEvent = match serde_json::from_str(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(
                    queue_id = delivery.id,
                    message_id = ?delivery.message_id,
                    error = %e,
                    "rejecting undecodable chat event"
                );
                self.queue.reject(delivery.id).await?;
                return Ok(DeliveryOutcome::Rejected);
            }
        };

        let msg_id = event.msg_id.clone();
        let result = tokio::time::timeout(self.handle_timeout, self.ingest.handle_chat(event)).await;
        match result {
            Ok(Ok(receipt)) => {
                self.queue.ack(delivery.id).await?;
                debug!(
                    queue_id = delivery.id,
                    msg_id = %receipt.msg_id,
                    seq = receipt.seq,
                    duplicate = receipt.duplicate,
                    "chat event ingested"
                );
                Ok(DeliveryOutcome::Acked)
            }
            Ok(Err(IngestError::InvalidArgument(reason))) => {
                error!(queue_id = delivery.id, msg_id = %msg_id, reason = %reason, "rejecting invalid chat event");
                self.queue.reject(delivery.id).await?;
                Ok(DeliveryOutcome::Rejected)
            }
            Ok(Err(e)) => self.requeue(&delivery, &msg_id, &e.to_string()).await,
            Err(_) => {
                let reason = format!("ingestion timed out after {:?}", self.handle_timeout);
                self.requeue(&delivery, &msg_id, &reason).await
            }
        }
    }

    async fn requeue(
        &self,
        delivery: &Delivery,
        msg_id: &str,
        reason: &str,
    ) -> Result<DeliveryOutcome, CourierError> {
        let outcome = self.queue.requeue(delivery.id).await?;
        match outcome {
            RequeueOutcome::Pending { attempts } => warn!(
                queue_id = delivery.id,
                msg_id,
                attempt = attempts,
                reason,
                "chat event requeued"
            ),
            RequeueOutcome::DeadLettered { attempts } => error!(
                queue_id = delivery.id,
                msg_id,
                attempt = attempts,
                reason,
                "chat event dead-lettered after max delivery attempts"
            ),
        }
        Ok(DeliveryOutcome::Requeued(outcome))
    }

    /// Claims and settles at most one delivery. `None` means the queue was idle.
    pub async fn poll_once(&self) -> Result<Option<DeliveryOutcome>, CourierError> {
        match self.queue.next_delivery(&self.queue_name).await? {
            Some(delivery) => self.process(delivery).await.map(Some),
            None => Ok(None),
        }
    }

    /// Runs one polling loop until `cancel` fires. The delivery in hand is
    /// settled before the loop exits.
    pub async fn run(&self, worker: usize, cancel: CancellationToken) {
        debug!(worker, queue = %self.queue_name, "consumer worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let idle = match self.poll_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    warn!(worker, error = %e, "consumer poll failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        debug!(worker, "consumer worker stopped");
    }

    /// Spawns the configured number of polling loops.
    pub fn spawn_workers(self: &Arc<Self>, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        info!(workers = self.workers, queue = %self.queue_name, "starting chat event consumers");
        (0..self.workers)
            .map(|worker| {
                let consumer = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { consumer.run(worker, cancel).await }.in_current_span())
            })
            .collect()
    }
}
