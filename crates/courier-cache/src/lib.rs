// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fast-path backends for Courier.
//!
//! Atomic per-conversation counters and per-recipient inboxes, backed by
//! Redis in production or by process memory for single-node deployments
//! and tests.

pub mod memory;
pub mod redis_inbox;
pub mod redis_seq;

pub use memory::{MemoryCounterSeq, MemoryInbox};
pub use redis_inbox::RedisInbox;
pub use redis_seq::RedisCounterSeq;

use courier_core::types::HealthStatus;
use courier_core::CourierError;
use redis::aio::MultiplexedConnection;

/// Opens a multiplexed connection to the Redis server at `url`.
///
/// The returned connection is cheap to clone; every clone shares one socket.
pub async fn connect(url: &str) -> Result<MultiplexedConnection, CourierError> {
    let client = redis::Client::open(url).map_err(CourierError::cache)?;
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(CourierError::cache)
}

/// Round-trips a `PING` and maps the result to a health status.
pub(crate) async fn ping(conn: &MultiplexedConnection) -> HealthStatus {
    let mut conn = conn.clone();
    match redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
    {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    }
}
