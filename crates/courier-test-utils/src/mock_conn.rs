// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock connection registry for push assertions.
//!
//! `MockConnections` implements `ConnLookup`; each registered user gets a
//! `RecordingSink` that captures every packet pushed to it.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::protocol::OutputPacket;
use courier_core::{ConnLookup, CourierError, PacketSink};
use dashmap::DashMap;
use tokio::sync::Mutex;

/// Captures packets sent to one connection.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<OutputPacket>>,
    broken: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every send fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub async fn sent_packets(&self) -> Vec<OutputPacket> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PacketSink for RecordingSink {
    async fn send(&self, packet: &OutputPacket) -> Result<(), CourierError> {
        if self.broken {
            return Err(CourierError::Internal("connection closed".into()));
        }
        self.sent.lock().await.push(packet.clone());
        Ok(())
    }
}

/// Online users and their sinks.
#[derive(Default)]
pub struct MockConnections {
    conns: DashMap<String, Arc<RecordingSink>>,
}

impl MockConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `user_id` online and returns the sink capturing its pushes.
    pub fn connect(&self, user_id: &str) -> Arc<RecordingSink> {
        let sink = Arc::new(RecordingSink::new());
        self.conns.insert(user_id.to_string(), Arc::clone(&sink));
        sink
    }

    pub fn connect_sink(&self, user_id: &str, sink: Arc<RecordingSink>) {
        self.conns.insert(user_id.to_string(), sink);
    }

    pub fn disconnect(&self, user_id: &str) {
        self.conns.remove(user_id);
    }
}

impl ConnLookup for MockConnections {
    fn get(&self, user_id: &str) -> Option<Arc<dyn PacketSink>> {
        self.conns
            .get(user_id)
            .map(|sink| Arc::clone(sink.value()) as Arc<dyn PacketSink>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::protocol::Cmd;

    #[tokio::test]
    async fn offline_users_have_no_sink() {
        let conns = MockConnections::new();
        let sink = conns.connect("u1");
        assert!(conns.get("u2").is_none());

        let found = conns.get("u1").unwrap();
        found.send(&OutputPacket::ok(Cmd::Heartbeat)).await.unwrap();
        assert_eq!(sink.sent_count().await, 1);

        conns.disconnect("u1");
        assert!(conns.get("u1").is_none());
    }

    #[tokio::test]
    async fn broken_sink_fails_sends() {
        let sink = RecordingSink::broken();
        assert!(sink.send(&OutputPacket::ok(Cmd::Chat)).await.is_err());
        assert_eq!(sink.sent_count().await, 0);
    }
}
