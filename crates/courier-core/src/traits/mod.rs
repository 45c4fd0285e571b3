// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits implemented by Courier backends.
//!
//! Backend capabilities extend the [`Backend`] base trait and use
//! `#[async_trait]` so services can hold them as `Arc<dyn Trait>`.

pub mod backend;
pub mod connection;
pub mod inbox;
pub mod queue;
pub mod sequence;
pub mod store;

pub use backend::Backend;
pub use connection::{ConnLookup, PacketSink};
pub use inbox::{InboxReader, InboxWriter};
pub use queue::{Delivery, EventQueue, RequeueOutcome};
pub use sequence::SeqGenerator;
pub use store::{MessageStore, TimelineStore};
