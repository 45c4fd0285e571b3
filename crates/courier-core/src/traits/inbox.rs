// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient inbox projection traits.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::backend::Backend;
use crate::types::{InboxEntry, TimelineMessage};

/// Fan-out sink writing a message into each recipient's inbox.
#[async_trait]
pub trait InboxWriter: Backend {
    /// Appends `msg` to every non-empty recipient inbox, keyed by `msg.seq`,
    /// and refreshes each inbox's retention horizon.
    ///
    /// The batch succeeds or fails as a whole; partial progress is not
    /// reported.
    async fn append(&self, msg: &TimelineMessage, recipients: &[String])
    -> Result<(), CourierError>;
}

/// Read side of the inbox projection.
#[async_trait]
pub trait InboxReader: Backend {
    /// Returns up to `limit` entries with `seq > after_seq`, ascending.
    async fn fetch(
        &self,
        user_id: &str,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<InboxEntry>, CourierError>;
}
