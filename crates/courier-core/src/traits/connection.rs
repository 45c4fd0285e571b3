// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection-registry capability exposed by the transport layer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CourierError;
use crate::protocol::OutputPacket;

/// Something that can deliver a packet to one connected client.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn send(&self, packet: &OutputPacket) -> Result<(), CourierError>;
}

/// Finds the live connection of a user, if they are online.
pub trait ConnLookup: Send + Sync {
    fn get(&self, user_id: &str) -> Option<Arc<dyn PacketSink>>;
}
