// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock backends and a harness over a temporary SQLite database so
//! integration tests run without Redis or any other external service.
//!
//! # Components
//!
//! - [`FlakyInbox`] - In-memory inbox that fails a configurable number of appends
//! - [`MockConnections`] - Connection registry capturing pushed packets
//! - [`TestHarness`] - Fully wired ingestion, pull, queue, and dispatch stack

pub mod harness;
pub mod mock_conn;
pub mod mock_inbox;

pub use harness::{HarnessSeq, TestHarness, TestHarnessBuilder};
pub use mock_conn::{MockConnections, RecordingSink};
pub use mock_inbox::FlakyInbox;
