// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier messaging pipeline.
//!
//! This crate provides the domain types, the error taxonomy, the client
//! protocol packets, and the capability traits that every backend (durable
//! store, counter service, inbox cache, event queue) implements. Pipeline
//! services depend only on these traits, never on a concrete backend.

pub mod error;
pub mod protocol;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use protocol::{ChatPayload, Cmd, InputPacket, OutputPacket};
pub use types::{
    BackendKind, ChatEvent, HealthStatus, InboxEntry, MsgType, TimelineMessage,
    UserConversationState,
};

// Re-export all capability traits at crate root.
pub use traits::{
    Backend, ConnLookup, Delivery, EventQueue, InboxReader, InboxWriter, MessageStore,
    PacketSink, RequeueOutcome, SeqGenerator, TimelineStore,
};
