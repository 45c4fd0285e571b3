// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, idempotent chat ingestion.

use std::sync::Arc;

use courier_core::protocol::{Cmd, OutputPacket};
use courier_core::types::{ChatEvent, MsgType, STATUS_NORMAL, TimelineMessage};
use courier_core::{CourierError, InboxWriter, MessageStore, SeqGenerator};
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::participants::private_participants;
use crate::retryer::InboxRetryer;

/// How a freshly stored message reaches recipient inboxes.
#[derive(Clone, Default)]
pub enum FanOut {
    /// No inbox projection.
    #[default]
    Disabled,
    /// Append inline; failures are logged and ignored.
    Direct(Arc<dyn InboxWriter>),
    /// Hand off to the background retryer.
    Retrying(Arc<InboxRetryer>),
}

/// Successful outcome of [`IngestionService::handle_chat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReceipt {
    pub msg_id: String,
    pub seq: u64,
    /// The `msg_id` was already stored; `seq` is the original assignment.
    pub duplicate: bool,
}

impl ChatReceipt {
    pub fn to_packet(&self) -> OutputPacket {
        OutputPacket::ok(Cmd::Chat)
            .with_msg_id(self.msg_id.clone())
            .with_seq(self.seq)
    }
}

/// The client-supplied `msg_id`, or a fresh UUID when none was given.
pub(crate) fn resolve_msg_id(msg_id: String) -> String {
    if msg_id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        msg_id
    }
}

/// Assigns seq, persists, and fans out chat messages.
///
/// With a [`SeqGenerator`] the seq is obtained before the save; without
/// one the store assigns it inside the insert transaction. A duplicate
/// `msg_id` resolves to the seq already stored.
pub struct IngestionService {
    store: Arc<dyn MessageStore>,
    seq_gen: Option<Arc<dyn SeqGenerator>>,
    fan_out: FanOut,
}

impl IngestionService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            seq_gen: None,
            fan_out: FanOut::Disabled,
        }
    }

    pub fn with_seq_generator(mut self, seq_gen: Arc<dyn SeqGenerator>) -> Self {
        self.seq_gen = Some(seq_gen);
        self
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub async fn handle_chat(&self, event: ChatEvent) -> Result<ChatReceipt, IngestError> {
        if event.conversation_id.is_empty() {
            return Err(IngestError::InvalidArgument(
                "conversation_id is required".to_string(),
            ));
        }
        let msg_type = MsgType::from_wire(event.msg_type).ok_or_else(|| {
            IngestError::InvalidArgument(format!("unknown msg_type {}", event.msg_type))
        })?;
        let msg_id = resolve_msg_id(event.msg_id);
        let send_time = if event.send_time == 0 {
            chrono::Utc::now().timestamp_millis()
        } else {
            event.send_time
        };

        let mut msg = TimelineMessage {
            msg_id,
            conversation_id: event.conversation_id,
            seq: 0,
            sender_id: event.sender_id,
            content: event.content,
            msg_type,
            status: STATUS_NORMAL,
            send_time,
        };

        if let Some(seq_gen) = &self.seq_gen {
            msg.seq = seq_gen
                .next_seq(&msg.conversation_id)
                .await
                .map_err(|source| IngestError::SequenceGeneration {
                    msg_id: msg.msg_id.clone(),
                    source,
                })?;
        }

        match self.store.save_message(&msg).await {
            Ok(seq) => msg.seq = seq,
            Err(CourierError::DuplicateMsgId { .. }) => return self.resolve_duplicate(msg).await,
            Err(source) => {
                return Err(IngestError::Persistence {
                    msg_id: msg.msg_id,
                    source,
                });
            }
        }

        debug!(
            conversation_id = %msg.conversation_id,
            msg_id = %msg.msg_id,
            seq = msg.seq,
            "message stored"
        );
        self.fan_out(&msg).await;

        Ok(ChatReceipt {
            msg_id: msg.msg_id,
            seq: msg.seq,
            duplicate: false,
        })
    }

    async fn resolve_duplicate(&self, msg: TimelineMessage) -> Result<ChatReceipt, IngestError> {
        debug!(
            conversation_id = %msg.conversation_id,
            msg_id = %msg.msg_id,
            "duplicate msg_id, returning stored seq"
        );
        match self.store.find_by_msg_id(&msg.msg_id).await {
            Ok(Some(existing)) => Ok(ChatReceipt {
                msg_id: existing.msg_id,
                seq: existing.seq,
                duplicate: true,
            }),
            Ok(None) => Err(IngestError::Persistence {
                source: CourierError::NotFound {
                    entity: "message".to_string(),
                    id: msg.msg_id.clone(),
                },
                msg_id: msg.msg_id,
            }),
            Err(source) => Err(IngestError::Persistence {
                msg_id: msg.msg_id,
                source,
            }),
        }
    }

    async fn fan_out(&self, msg: &TimelineMessage) {
        let recipients = private_participants(&msg.conversation_id, &msg.sender_id);
        if recipients.is_empty() {
            return;
        }
        match &self.fan_out {
            FanOut::Disabled => {}
            FanOut::Direct(writer) => {
                if let Err(e) = writer.append(msg, &recipients).await {
                    warn!(
                        conversation_id = %msg.conversation_id,
                        msg_id = %msg.msg_id,
                        error = %e,
                        "inbox fan-out failed"
                    );
                }
            }
            FanOut::Retrying(retryer) => {
                retryer.enqueue(msg, recipients);
            }
        }
    }
}
