// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion failure classification.

use courier_core::protocol::{CODE_BAD_REQUEST, CODE_FAILURE};
use courier_core::CourierError;
use thiserror::Error;

/// Why a chat submission was not ingested.
///
/// Every variant past input validation carries the resolved `msg_id`, so
/// the caller can retry with the same id and rely on idempotency.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or malformed input. Nothing reached storage.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The sequence backend failed; the message was not saved.
    #[error("generate seq failed for msg_id `{msg_id}`: {source}")]
    SequenceGeneration {
        msg_id: String,
        #[source]
        source: CourierError,
    },

    /// The durable store rejected the message for a reason other than a
    /// duplicate `msg_id`.
    #[error("save message failed for msg_id `{msg_id}`: {source}")]
    Persistence {
        msg_id: String,
        #[source]
        source: CourierError,
    },

    /// The event could not be handed to the durable queue.
    #[error("publish failed for msg_id `{msg_id}`: {source}")]
    Publish {
        msg_id: String,
        #[source]
        source: CourierError,
    },
}

impl IngestError {
    /// Protocol response code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            IngestError::InvalidArgument(_) => CODE_BAD_REQUEST,
            _ => CODE_FAILURE,
        }
    }

    /// The `msg_id` the failed attempt used, if one was resolved.
    pub fn msg_id(&self) -> Option<&str> {
        match self {
            IngestError::InvalidArgument(_) => None,
            IngestError::SequenceGeneration { msg_id, .. }
            | IngestError::Persistence { msg_id, .. }
            | IngestError::Publish { msg_id, .. } => Some(msg_id),
        }
    }

    /// Short client-facing reason.
    pub fn reason(&self) -> String {
        match self {
            IngestError::InvalidArgument(detail) => detail.clone(),
            IngestError::SequenceGeneration { .. } => "generate seq failed".to_string(),
            IngestError::Persistence { .. } => "save message failed".to_string(),
            IngestError::Publish { .. } => "publish failed".to_string(),
        }
    }
}
