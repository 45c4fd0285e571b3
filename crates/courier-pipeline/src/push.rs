// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort delivery of packets to online users.

use std::sync::Arc;

use courier_core::protocol::OutputPacket;
use courier_core::{ConnLookup, CourierError};
use futures::future::join_all;
use tracing::{debug, warn};

pub struct PushService {
    conns: Arc<dyn ConnLookup>,
}

impl PushService {
    pub fn new(conns: Arc<dyn ConnLookup>) -> Self {
        Self { conns }
    }

    /// Sends `packet` to every target with a live connection.
    ///
    /// Offline targets are skipped. A failed send does not stop the others;
    /// the first failure in target order is returned.
    pub async fn broadcast(
        &self,
        packet: &OutputPacket,
        targets: &[String],
    ) -> Result<(), CourierError> {
        let sinks: Vec<_> = targets
            .iter()
            .filter_map(|target| self.conns.get(target).map(|sink| (target, sink)))
            .collect();
        debug!(targets = targets.len(), online = sinks.len(), "broadcasting packet");

        let results = join_all(sinks.iter().map(|(_, sink)| sink.send(packet))).await;

        let mut first_err = None;
        for ((target, _), result) in sinks.iter().zip(results) {
            if let Err(e) = result {
                warn!(user_id = %target, error = %e, "push failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
