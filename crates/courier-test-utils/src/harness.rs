// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` wires a complete pipeline over a temp SQLite database: the
//! store, a seq generator, a [`FlakyInbox`] behind the retrying fan-out, an
//! optional durable queue with its consumer, and a dispatcher that pushes to
//! [`MockConnections`].

use std::sync::Arc;
use std::time::Duration;

use courier_cache::MemoryCounterSeq;
use courier_config::model::{QueueConfig, StorageConfig};
use courier_core::protocol::{Cmd, InputPacket, OutputPacket};
use courier_core::{CourierError, SeqGenerator};
use courier_pipeline::{
    DeliveryOutcome, Dispatcher, FanOut, InboxRetryer, IngestionService, MessageConsumer,
    MessageProducer, PullService, PushService, RetryOptions,
};
use courier_storage::{LockedMaxSeq, SqliteQueue, SqliteStore};
use serde_json::json;

use crate::mock_conn::MockConnections;
use crate::mock_inbox::FlakyInbox;

/// Where the harness gets sequence numbers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarnessSeq {
    /// The store reserves seq inside the insert transaction.
    #[default]
    Store,
    /// Serialized `max(seq) + 1` on the same database.
    LockedMax,
    /// In-process counter; gaps are possible.
    Counter,
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    seq: HarnessSeq,
    inbox_failures: u32,
    retry: RetryOptions,
    direct_fan_out: bool,
    queue: Option<QueueConfig>,
    request_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            seq: HarnessSeq::default(),
            inbox_failures: 0,
            retry: RetryOptions {
                queue_size: 64,
                max_attempts: 5,
                base_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(20),
                attempt_timeout: Duration::from_secs(1),
            },
            direct_fan_out: false,
            queue: None,
            request_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_seq(mut self, seq: HarnessSeq) -> Self {
        self.seq = seq;
        self
    }

    /// The inbox fails this many appends before recovering.
    pub fn with_inbox_failures(mut self, failures: u32) -> Self {
        self.inbox_failures = failures;
        self
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Append to inboxes inline instead of through the retryer.
    pub fn with_direct_fan_out(mut self) -> Self {
        self.direct_fan_out = true;
        self
    }

    /// Route chats through a durable queue drained by [`TestHarness::drain_queue`].
    pub fn with_queue(mut self) -> Self {
        self.queue = Some(QueueConfig {
            enabled: true,
            poll_interval_ms: 10,
            ..QueueConfig::default()
        });
        self
    }

    pub fn with_queue_config(mut self, config: QueueConfig) -> Self {
        self.queue = Some(config);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CourierError> {
        let temp_dir = tempfile::TempDir::new().map_err(CourierError::storage)?;
        let db_path = temp_dir.path().join("courier.db");

        let store = SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..StorageConfig::default()
        });
        store.initialize().await?;
        let store = Arc::new(store);
        let db = store.database()?.clone();

        let inbox = Arc::new(FlakyInbox::new(self.inbox_failures));
        let (fan_out, retryer) = if self.direct_fan_out {
            (FanOut::Direct(inbox.clone()), None)
        } else {
            let retryer = Arc::new(InboxRetryer::start(inbox.clone(), self.retry));
            (FanOut::Retrying(Arc::clone(&retryer)), Some(retryer))
        };

        let mut ingest = IngestionService::new(store.clone()).with_fan_out(fan_out);
        let seq_gen: Option<Arc<dyn SeqGenerator>> = match self.seq {
            HarnessSeq::Store => None,
            HarnessSeq::LockedMax => Some(Arc::new(LockedMaxSeq::new(db.clone()))),
            HarnessSeq::Counter => Some(Arc::new(MemoryCounterSeq::new())),
        };
        if let Some(seq_gen) = seq_gen {
            ingest = ingest.with_seq_generator(seq_gen);
        }
        let ingest = Arc::new(ingest);
        let pull = Arc::new(PullService::new(store.clone()));
        let conns = Arc::new(MockConnections::new());

        let mut dispatcher = Dispatcher::new(Arc::clone(&ingest), Arc::clone(&pull))
            .with_push(Arc::new(PushService::new(conns.clone())))
            .with_request_timeout(self.request_timeout);

        let (queue, consumer) = match &self.queue {
            Some(config) => {
                let queue = Arc::new(SqliteQueue::from_config(db, config));
                let producer = MessageProducer::from_config(queue.clone(), config);
                dispatcher = dispatcher.with_producer(Arc::new(producer));
                let consumer =
                    MessageConsumer::new(queue.clone(), Arc::clone(&ingest), config);
                (Some(queue), Some(Arc::new(consumer)))
            }
            None => (None, None),
        };

        Ok(TestHarness {
            store,
            inbox,
            ingest,
            pull,
            dispatcher,
            conns,
            queue,
            consumer,
            retryer,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over temp storage.
pub struct TestHarness {
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    /// Inbox projection behind the fan-out.
    pub inbox: Arc<FlakyInbox>,
    pub ingest: Arc<IngestionService>,
    pub pull: Arc<PullService>,
    pub dispatcher: Dispatcher,
    /// Online users; pushes land in their sinks.
    pub conns: Arc<MockConnections>,
    /// Present when built `with_queue`.
    pub queue: Option<Arc<SqliteQueue>>,
    pub consumer: Option<Arc<MessageConsumer>>,
    /// Present unless built `with_direct_fan_out`.
    pub retryer: Option<Arc<InboxRetryer>>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Submits a text chat as `user_id`. An empty `msg_id` lets the server pick one.
    pub async fn chat(
        &self,
        user_id: &str,
        conversation_id: &str,
        msg_id: &str,
        content: &str,
    ) -> OutputPacket {
        let packet = InputPacket {
            msg_id: msg_id.to_string(),
            conversation_id: conversation_id.to_string(),
            payload: Some(json!({ "content": content, "msg_type": 1 })),
            ..InputPacket::new(Cmd::Chat)
        };
        self.dispatcher.handle(user_id, packet).await
    }

    pub async fn pull(&self, user_id: &str, conversation_id: &str, cursor_seq: u64) -> OutputPacket {
        let packet = InputPacket {
            conversation_id: conversation_id.to_string(),
            cursor_seq,
            ..InputPacket::new(Cmd::Pull)
        };
        self.dispatcher.handle(user_id, packet).await
    }

    pub async fn ack(&self, user_id: &str, conversation_id: &str, seq: u64) -> OutputPacket {
        let packet = InputPacket {
            conversation_id: conversation_id.to_string(),
            cursor_seq: seq,
            ..InputPacket::new(Cmd::Ack)
        };
        self.dispatcher.handle(user_id, packet).await
    }

    /// Settles queued deliveries until the queue is idle.
    ///
    /// A requeued delivery is claimable again at once, so draining stops at
    /// the first requeue. Returns the outcomes in order.
    pub async fn drain_queue(&self) -> Result<Vec<DeliveryOutcome>, CourierError> {
        let Some(consumer) = &self.consumer else {
            return Err(CourierError::Internal(
                "harness was built without a queue".to_string(),
            ));
        };
        let mut outcomes = Vec::new();
        while let Some(outcome) = consumer.poll_once().await? {
            let requeued = matches!(outcome, DeliveryOutcome::Requeued(_));
            outcomes.push(outcome);
            if requeued {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Waits until `user_id`'s inbox holds `count` entries or `timeout` elapses.
    pub async fn wait_for_inbox(&self, user_id: &str, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.inbox.len(user_id) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.inbox.len(user_id) >= count
    }

    /// Stops the retryer and closes the database.
    pub async fn shutdown(&self) -> Result<(), CourierError> {
        if let Some(retryer) = &self.retryer {
            retryer.stop().await;
        }
        self.store.close().await
    }
}
