// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Courier message pipeline.
//!
//! Orchestrates ordered ingestion of chat messages: sequence assignment,
//! idempotent persistence, best-effort inbox fan-out through a retrying
//! background worker, optional decoupling through a durable queue, cursor
//! based pulls, acknowledgements, and pushes to online users. Transport
//! adapters feed [`InputPacket`](courier_core::InputPacket)s into the
//! [`Dispatcher`].

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod participants;
pub mod producer;
pub mod pull;
pub mod push;
pub mod retryer;
pub mod shutdown;

pub use consumer::{DeliveryOutcome, MessageConsumer};
pub use dispatcher::Dispatcher;
pub use error::IngestError;
pub use ingest::{ChatReceipt, FanOut, IngestionService};
pub use participants::private_participants;
pub use producer::MessageProducer;
pub use pull::{PullPage, PullService};
pub use push::PushService;
pub use retryer::{InboxRetryer, RetryOptions};
