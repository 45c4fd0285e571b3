// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite store of record for Courier.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the durable backends of the
//! ingestion pipeline: the idempotent timeline store, acknowledgement
//! cursors, the transactional sequence generator, and the event queue.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod queue;
pub mod sequence;

pub use adapter::SqliteStore;
pub use database::Database;
pub use models::QueueEntry;
pub use queue::SqliteQueue;
pub use sequence::LockedMaxSeq;
