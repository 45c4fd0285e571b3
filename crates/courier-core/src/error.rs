// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier messaging pipeline.

use thiserror::Error;

/// The primary error type returned by every backend capability.
///
/// The ingestion service branches on `DuplicateMsgId` to resolve client
/// retries to the already-assigned `seq`.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid values, missing backends).
    #[error("configuration error: {0}")]
    Config(String),

    /// A required field is missing or malformed. Never reaches storage.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The durable store already holds a row with this `msg_id`.
    #[error("duplicate msg_id `{msg_id}`")]
    DuplicateMsgId { msg_id: String },

    /// Durable store failures (connection, query, non-duplicate constraint).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Counter or inbox cache failures.
    #[error("cache error: {source}")]
    Cache {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Event queue failures (publish, claim, acknowledgement).
    #[error("queue error: {message}")]
    Queue {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A looked-up entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wraps any error as a cache-backend failure.
    pub fn cache(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        CourierError::Cache {
            source: Box::new(err),
        }
    }

    /// Wraps any error as a durable-store failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        CourierError::Storage {
            source: Box::new(err),
        }
    }

    /// Returns `true` for the idempotent-replay signal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CourierError::DuplicateMsgId { .. })
    }
}
