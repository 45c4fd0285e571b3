// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend assembly from configuration.
//!
//! Every subcommand builds the same [`Stack`] so the CLI drives exactly the
//! backends a running server would use.

use std::sync::Arc;

use courier_cache::{MemoryCounterSeq, MemoryInbox, RedisCounterSeq, RedisInbox};
use courier_config::model::{CourierConfig, InboxBackend, SeqStrategy};
use courier_core::{Backend, CourierError, InboxReader, InboxWriter, SeqGenerator};
use courier_pipeline::{
    Dispatcher, FanOut, InboxRetryer, IngestionService, MessageProducer, PullService,
    RetryOptions,
};
use courier_storage::{LockedMaxSeq, SqliteQueue, SqliteStore};
use tracing::{debug, info};

/// Initialized backends for one process.
pub struct Stack {
    pub store: Arc<SqliteStore>,
    pub seq_gen: Option<Arc<dyn SeqGenerator>>,
    pub inbox_writer: Option<Arc<dyn InboxWriter>>,
    pub inbox_reader: Option<Arc<dyn InboxReader>>,
    pub queue: Option<Arc<SqliteQueue>>,
    /// Every backend above, for health reporting.
    pub backends: Vec<Arc<dyn Backend>>,
}

impl Stack {
    /// Opens storage and connects the configured sequence, inbox, and queue backends.
    pub async fn build(config: &CourierConfig) -> Result<Self, CourierError> {
        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await?;
        let store = Arc::new(store);
        let db = store.database()?.clone();
        let mut backends: Vec<Arc<dyn Backend>> = vec![store.clone()];

        let redis = if needs_redis(config) {
            let url = require_redis_url(config)?;
            Some(courier_cache::connect(url).await?)
        } else {
            None
        };

        let seq_gen: Option<Arc<dyn SeqGenerator>> = match config.sequence.strategy {
            SeqStrategy::LockedMax => {
                let seq = Arc::new(LockedMaxSeq::new(db.clone()));
                backends.push(seq.clone());
                Some(seq)
            }
            SeqStrategy::AtomicCounter => {
                let conn = redis
                    .clone()
                    .ok_or_else(|| CourierError::Config("redis connection missing".into()))?;
                let seq = Arc::new(RedisCounterSeq::new(conn, config.sequence.key_prefix.clone()));
                backends.push(seq.clone());
                Some(seq)
            }
        };

        let (inbox_writer, inbox_reader): (
            Option<Arc<dyn InboxWriter>>,
            Option<Arc<dyn InboxReader>>,
        ) = match config.inbox.backend {
            InboxBackend::Redis => {
                let conn = redis
                    .clone()
                    .ok_or_else(|| CourierError::Config("redis connection missing".into()))?;
                let inbox = Arc::new(RedisInbox::new(
                    conn,
                    config.inbox.key_prefix.clone(),
                    config.inbox.ttl(),
                ));
                backends.push(inbox.clone());
                (Some(inbox.clone()), Some(inbox))
            }
            InboxBackend::Memory => {
                let inbox = Arc::new(MemoryInbox::new(config.inbox.ttl()));
                backends.push(inbox.clone());
                (Some(inbox.clone()), Some(inbox))
            }
            InboxBackend::Disabled => (None, None),
        };

        let queue = if config.queue.enabled {
            let queue = Arc::new(SqliteQueue::from_config(db, &config.queue));
            backends.push(queue.clone());
            Some(queue)
        } else {
            None
        };

        info!(
            sequence = ?config.sequence.strategy,
            inbox = ?config.inbox.backend,
            queue = config.queue.enabled,
            "backends initialized"
        );
        Ok(Self {
            store,
            seq_gen,
            inbox_writer,
            inbox_reader,
            queue,
            backends,
        })
    }

    /// Starts the fan-out retryer when an inbox backend is configured.
    pub fn start_retryer(&self, config: &CourierConfig) -> Option<Arc<InboxRetryer>> {
        let writer = self.inbox_writer.clone()?;
        let options = RetryOptions::from(&config.retry);
        debug!(queue_size = options.queue_size, "starting inbox retryer");
        Some(Arc::new(InboxRetryer::start(writer, options)))
    }

    pub fn ingestion(&self, retryer: Option<&Arc<InboxRetryer>>) -> IngestionService {
        let fan_out = match retryer {
            Some(retryer) => FanOut::Retrying(Arc::clone(retryer)),
            None => self
                .inbox_writer
                .clone()
                .map_or(FanOut::Disabled, FanOut::Direct),
        };
        let ingest = IngestionService::new(self.store.clone()).with_fan_out(fan_out);
        match &self.seq_gen {
            Some(seq_gen) => ingest.with_seq_generator(Arc::clone(seq_gen)),
            None => ingest,
        }
    }

    pub fn dispatcher(&self, config: &CourierConfig, ingest: Arc<IngestionService>) -> Dispatcher {
        let pull = Arc::new(PullService::from_config(self.store.clone(), &config.service));
        let dispatcher = Dispatcher::new(ingest, pull)
            .with_request_timeout(config.service.request_timeout());
        match &self.queue {
            Some(queue) => dispatcher.with_producer(Arc::new(MessageProducer::from_config(
                queue.clone(),
                &config.queue,
            ))),
            None => dispatcher,
        }
    }

    pub async fn close(&self) -> Result<(), CourierError> {
        self.store.close().await
    }
}

fn needs_redis(config: &CourierConfig) -> bool {
    config.sequence.strategy == SeqStrategy::AtomicCounter
        || config.inbox.backend == InboxBackend::Redis
}

fn require_redis_url(config: &CourierConfig) -> Result<&str, CourierError> {
    config
        .redis
        .url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| CourierError::Config("redis.url is required".into()))
}
