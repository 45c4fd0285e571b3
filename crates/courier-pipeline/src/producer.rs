// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publishes chat submissions to the durable queue.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::QueueConfig;
use courier_core::types::ChatEvent;
use courier_core::{CourierError, EventQueue};
use tracing::debug;

/// Serializes [`ChatEvent`]s onto an [`EventQueue`], tagged with `msg_id`.
///
/// A successful publish means the event is durably queued, not stored in
/// the timeline.
pub struct MessageProducer {
    queue: Arc<dyn EventQueue>,
    queue_name: String,
    publish_timeout: Duration,
}

impl MessageProducer {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        queue_name: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            publish_timeout,
        }
    }

    pub fn from_config(queue: Arc<dyn EventQueue>, config: &QueueConfig) -> Self {
        Self::new(
            queue,
            config.queue_name.clone(),
            Duration::from_millis(config.publish_timeout_ms),
        )
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Publishes `event`, returning the queue entry id.
    pub async fn publish_chat(&self, event: &ChatEvent) -> Result<i64, CourierError> {
        let payload = serde_json::to_string(event)?;
        let publish = self.queue.publish(&self.queue_name, &event.msg_id, &payload);
        let id = tokio::time::timeout(self.publish_timeout, publish)
            .await
            .map_err(|_| CourierError::Timeout {
                duration: self.publish_timeout,
            })??;
        debug!(
            queue = %self.queue_name,
            queue_id = id,
            msg_id = %event.msg_id,
            conversation_id = %event.conversation_id,
            "chat event published"
        );
        Ok(id)
    }
}
