// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types that only exist inside the storage crate.
//!
//! Timeline and cursor rows map directly onto `courier_core::types`.

use courier_core::Delivery;

/// A row of the `queue` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub message_id: Option<String>,
    pub payload: String,
    pub status: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

impl From<QueueEntry> for Delivery {
    fn from(entry: QueueEntry) -> Self {
        Delivery {
            id: entry.id,
            queue_name: entry.queue_name,
            message_id: entry.message_id,
            payload: entry.payload,
            attempts: entry.attempts,
        }
    }
}
