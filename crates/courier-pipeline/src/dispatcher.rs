// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport-agnostic packet handling.
//!
//! A transport authenticates the user, decodes an [`InputPacket`], and
//! writes back whatever [`Dispatcher::handle`] returns. Every command gets
//! exactly one response packet.

use std::sync::Arc;
use std::time::Duration;

use courier_core::protocol::{CODE_BAD_REQUEST, CODE_FAILURE, ChatPayload, Cmd, InputPacket, OutputPacket};
use courier_core::types::{ChatEvent, MsgType};
use courier_core::CourierError;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::ingest::{ChatReceipt, IngestionService, resolve_msg_id};
use crate::participants::private_participants;
use crate::producer::MessageProducer;
use crate::pull::PullService;
use crate::push::PushService;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub struct Dispatcher {
    ingest: Arc<IngestionService>,
    pull: Arc<PullService>,
    producer: Option<Arc<MessageProducer>>,
    push: Option<Arc<PushService>>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(ingest: Arc<IngestionService>, pull: Arc<PullService>) -> Self {
        Self {
            ingest,
            pull,
            producer: None,
            push: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Route chats through the durable queue and reply `accepted`.
    pub fn with_producer(mut self, producer: Arc<MessageProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Notify the other participants of directly ingested chats.
    pub fn with_push(mut self, push: Arc<PushService>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub async fn handle(&self, user_id: &str, packet: InputPacket) -> OutputPacket {
        match packet.cmd {
            Cmd::Heartbeat => OutputPacket::ok(Cmd::Heartbeat),
            // Identity is established by the transport before packets arrive.
            Cmd::Login => OutputPacket::ok(Cmd::Login),
            Cmd::Chat => self.handle_chat(user_id, packet).await,
            Cmd::Pull => self.handle_pull(packet).await,
            Cmd::Ack => self.handle_ack(user_id, packet).await,
            Cmd::Unknown(code) => {
                debug!(user_id, cmd = code, "unknown command");
                OutputPacket::failure(packet.cmd, CODE_BAD_REQUEST, format!("unknown cmd {code}"))
                    .with_msg_id(packet.msg_id)
            }
        }
    }

    async fn handle_chat(&self, user_id: &str, packet: InputPacket) -> OutputPacket {
        if packet.conversation_id.is_empty() {
            return OutputPacket::failure(Cmd::Chat, CODE_BAD_REQUEST, "conversation_id is required")
                .with_msg_id(packet.msg_id);
        }
        let payload = match packet.payload.map(serde_json::from_value::<ChatPayload>) {
            Some(Ok(payload)) => payload,
            Some(Err(_)) | None => {
                return OutputPacket::failure(Cmd::Chat, CODE_BAD_REQUEST, "invalid chat payload")
                    .with_msg_id(packet.msg_id);
            }
        };

        // Checked before the queue hand-off; a queued event must be
        // replayable.
        if MsgType::from_wire(payload.msg_type).is_none() {
            return OutputPacket::failure(
                Cmd::Chat,
                CODE_BAD_REQUEST,
                format!("unknown msg_type {}", payload.msg_type),
            )
            .with_msg_id(packet.msg_id);
        }

        // Resolved up front so every reply, including a timeout, names the
        // id the client should retry with.
        let msg_id = resolve_msg_id(packet.msg_id);
        let event = ChatEvent {
            msg_id: msg_id.clone(),
            conversation_id: packet.conversation_id,
            sender_id: user_id.to_string(),
            content: payload.content,
            msg_type: payload.msg_type,
            send_time: payload.send_time,
        };

        if let Some(producer) = &self.producer {
            return match producer.publish_chat(&event).await {
                Ok(_) => OutputPacket::ok(Cmd::Chat)
                    .with_msg_id(msg_id)
                    .with_payload(Value::String("accepted".to_string())),
                Err(source) => {
                    let err = IngestError::Publish {
                        msg_id: msg_id.clone(),
                        source,
                    };
                    warn!(msg_id = %msg_id, error = %err, "chat publish failed");
                    OutputPacket::failure(Cmd::Chat, err.code(), err.reason()).with_msg_id(msg_id)
                }
            };
        }

        let notification = self.push.as_ref().map(|_| event.clone());
        match tokio::time::timeout(self.request_timeout, self.ingest.handle_chat(event)).await {
            Ok(Ok(receipt)) => {
                if let Some(event) = notification {
                    if !receipt.duplicate {
                        self.notify(&event, &receipt).await;
                    }
                }
                receipt.to_packet()
            }
            Ok(Err(e)) => {
                warn!(msg_id = %msg_id, error = %e, "chat ingestion failed");
                OutputPacket::failure(Cmd::Chat, e.code(), e.reason()).with_msg_id(msg_id)
            }
            Err(_) => {
                warn!(msg_id = %msg_id, timeout_ms = self.request_timeout.as_millis() as u64, "chat ingestion timed out");
                OutputPacket::failure(Cmd::Chat, CODE_FAILURE, "request timed out").with_msg_id(msg_id)
            }
        }
    }

    async fn notify(&self, event: &ChatEvent, receipt: &ChatReceipt) {
        let Some(push) = &self.push else {
            return;
        };
        let targets: Vec<String> = private_participants(&event.conversation_id, &event.sender_id)
            .into_iter()
            .filter(|user| *user != event.sender_id)
            .collect();
        if targets.is_empty() {
            return;
        }
        let packet = receipt.to_packet().with_payload(json!({
            "conversation_id": event.conversation_id,
            "sender_id": event.sender_id,
            "content": event.content,
            "msg_type": event.msg_type.max(1),
        }));
        if let Err(e) = push.broadcast(&packet, &targets).await {
            warn!(msg_id = %receipt.msg_id, error = %e, "chat push failed");
        }
    }

    async fn handle_pull(&self, packet: InputPacket) -> OutputPacket {
        let pull = self
            .pull
            .pull_messages(&packet.conversation_id, packet.cursor_seq, 0);
        let result = match tokio::time::timeout(self.request_timeout, pull).await {
            Ok(result) => result.and_then(|page| page.to_packet()),
            Err(_) => Err(CourierError::Timeout {
                duration: self.request_timeout,
            }),
        };
        result.unwrap_or_else(|e| failure_packet(Cmd::Pull, &e))
    }

    async fn handle_ack(&self, user_id: &str, packet: InputPacket) -> OutputPacket {
        let ack = self
            .pull
            .ack_conversation(user_id, &packet.conversation_id, packet.cursor_seq);
        let result = match tokio::time::timeout(self.request_timeout, ack).await {
            Ok(result) => result,
            Err(_) => Err(CourierError::Timeout {
                duration: self.request_timeout,
            }),
        };
        match result {
            Ok(()) => OutputPacket::ok(Cmd::Ack),
            Err(e) => failure_packet(Cmd::Ack, &e),
        }
    }
}

fn failure_packet(cmd: Cmd, err: &CourierError) -> OutputPacket {
    match err {
        CourierError::InvalidArgument(reason) => {
            OutputPacket::failure(cmd, CODE_BAD_REQUEST, reason.clone())
        }
        other => {
            warn!(?cmd, error = %other, "request failed");
            OutputPacket::failure(cmd, CODE_FAILURE, other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use courier_config::model::{QueueConfig, StorageConfig};
    use courier_core::{ConnLookup, EventQueue, MessageStore, PacketSink, TimelineStore};
    use courier_storage::{SqliteQueue, SqliteStore};
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutputPacket>>,
    }

    #[async_trait]
    impl PacketSink for Recorder {
        async fn send(&self, packet: &OutputPacket) -> Result<(), CourierError> {
            self.sent.lock().unwrap().push(packet.clone());
            Ok(())
        }
    }

    struct Conns(HashMap<String, Arc<Recorder>>);

    impl ConnLookup for Conns {
        fn get(&self, user_id: &str) -> Option<Arc<dyn PacketSink>> {
            self.0
                .get(user_id)
                .map(|sink| Arc::clone(sink) as Arc<dyn PacketSink>)
        }
    }

    struct Fixture {
        store: Arc<SqliteStore>,
        dispatcher: Dispatcher,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(StorageConfig {
            database_path: dir.path().join("dispatch.db").to_string_lossy().to_string(),
            ..StorageConfig::default()
        });
        store.initialize().await.unwrap();
        let store = Arc::new(store);
        let ingest = Arc::new(IngestionService::new(store.clone()));
        let pull = Arc::new(PullService::new(store.clone()));
        Fixture {
            store,
            dispatcher: Dispatcher::new(ingest, pull),
            _dir: dir,
        }
    }

    fn chat_packet(msg_id: &str, conversation_id: &str, content: &str) -> InputPacket {
        InputPacket {
            msg_id: msg_id.to_string(),
            conversation_id: conversation_id.to_string(),
            payload: Some(json!({ "content": content })),
            ..InputPacket::new(Cmd::Chat)
        }
    }

    #[tokio::test]
    async fn heartbeat_and_login_are_acknowledged() {
        let f = fixture().await;
        let reply = f.dispatcher.handle("u1", InputPacket::new(Cmd::Heartbeat)).await;
        assert_eq!(reply.cmd, Cmd::Heartbeat);
        assert!(reply.is_ok());
        assert!(f.dispatcher.handle("u1", InputPacket::new(Cmd::Login)).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_command_is_bad_request() {
        let f = fixture().await;
        let reply = f.dispatcher.handle("u1", InputPacket::new(Cmd::Unknown(9))).await;
        assert_eq!(reply.code, 400);
        assert_eq!(reply.cmd, Cmd::Unknown(9));
    }

    #[tokio::test]
    async fn chat_is_stored_and_returns_seq() {
        let f = fixture().await;
        let reply = f
            .dispatcher
            .handle("u1", chat_packet("m1", "private_u1_u2", "hi"))
            .await;
        assert!(reply.is_ok());
        assert_eq!(reply.msg_id, "m1");
        assert_eq!(reply.seq, 1);

        // A retried submission returns the same seq.
        let again = f
            .dispatcher
            .handle("u1", chat_packet("m1", "private_u1_u2", "hi"))
            .await;
        assert_eq!(again.seq, 1);
    }

    #[tokio::test]
    async fn chat_without_msg_id_gets_one() {
        let f = fixture().await;
        let reply = f.dispatcher.handle("u1", chat_packet("", "c1", "hi")).await;
        assert!(reply.is_ok());
        assert!(!reply.msg_id.is_empty());
        assert!(f.store.find_by_msg_id(&reply.msg_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn chat_validation_failures_are_bad_requests() {
        let f = fixture().await;

        let reply = f.dispatcher.handle("u1", chat_packet("m1", "", "hi")).await;
        assert_eq!(reply.code, 400);
        assert_eq!(reply.msg_id, "m1");

        let mut no_payload = chat_packet("m2", "c1", "hi");
        no_payload.payload = None;
        assert_eq!(f.dispatcher.handle("u1", no_payload).await.code, 400);

        let mut bad_payload = chat_packet("m3", "c1", "hi");
        bad_payload.payload = Some(json!({ "content": 5 }));
        assert_eq!(f.dispatcher.handle("u1", bad_payload).await.code, 400);

        let mut bad_type = chat_packet("m4", "c1", "hi");
        bad_type.payload = Some(json!({ "content": "x", "msg_type": 7 }));
        assert_eq!(f.dispatcher.handle("u1", bad_type).await.code, 400);

        assert!(f.store.list_messages("c1", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pull_and_ack_round_trip() {
        let f = fixture().await;
        for i in 0..3 {
            f.dispatcher
                .handle("u1", chat_packet(&format!("m{i}"), "c1", "hi"))
                .await;
        }

        let pull = InputPacket {
            conversation_id: "c1".into(),
            cursor_seq: 1,
            ..InputPacket::new(Cmd::Pull)
        };
        let reply = f.dispatcher.handle("u2", pull).await;
        assert!(reply.is_ok());
        assert_eq!(reply.next_cursor_seq, 3);
        assert!(!reply.has_more);
        let messages = reply.payload.unwrap()["messages"].as_array().unwrap().len();
        assert_eq!(messages, 2);

        let ack = InputPacket {
            conversation_id: "c1".into(),
            cursor_seq: 3,
            ..InputPacket::new(Cmd::Ack)
        };
        assert!(f.dispatcher.handle("u2", ack).await.is_ok());
        let state = f.store.get_ack_state("u2", "c1").await.unwrap().unwrap();
        assert_eq!(state.last_ack_seq, 3);
    }

    #[tokio::test]
    async fn pull_without_conversation_is_bad_request() {
        let f = fixture().await;
        let reply = f.dispatcher.handle("u1", InputPacket::new(Cmd::Pull)).await;
        assert_eq!(reply.code, 400);
        let reply = f.dispatcher.handle("u1", InputPacket::new(Cmd::Ack)).await;
        assert_eq!(reply.code, 400);
    }

    #[tokio::test]
    async fn producer_path_replies_accepted_without_storing() {
        let f = fixture().await;
        let db = f.store.database().unwrap().clone();
        let queue = Arc::new(SqliteQueue::from_config(db, &QueueConfig::default()));
        let producer = Arc::new(MessageProducer::from_config(queue.clone(), &QueueConfig::default()));
        let dispatcher = Dispatcher::new(
            Arc::new(IngestionService::new(f.store.clone())),
            Arc::new(PullService::new(f.store.clone())),
        )
        .with_producer(producer);

        let reply = dispatcher.handle("u1", chat_packet("", "c1", "hi")).await;
        assert!(reply.is_ok());
        assert_eq!(reply.payload, Some(Value::String("accepted".into())));
        assert!(!reply.msg_id.is_empty());

        assert!(f.store.find_by_msg_id(&reply.msg_id).await.unwrap().is_none());
        let delivery = queue.next_delivery("im.msg.process").await.unwrap().unwrap();
        assert_eq!(delivery.message_id.as_deref(), Some(reply.msg_id.as_str()));
        let event: ChatEvent = serde_json::from_str(&delivery.payload).unwrap();
        assert_eq!(event.sender_id, "u1");
    }

    #[tokio::test]
    async fn producer_path_rejects_unknown_msg_type_before_publishing() {
        let f = fixture().await;
        let db = f.store.database().unwrap().clone();
        let queue = Arc::new(SqliteQueue::from_config(db, &QueueConfig::default()));
        let producer = Arc::new(MessageProducer::from_config(queue.clone(), &QueueConfig::default()));
        let dispatcher = Dispatcher::new(
            Arc::new(IngestionService::new(f.store.clone())),
            Arc::new(PullService::new(f.store.clone())),
        )
        .with_producer(producer);

        let mut packet = chat_packet("m1", "c1", "x");
        packet.payload = Some(json!({ "content": "x", "msg_type": 9 }));
        let reply = dispatcher.handle("u1", packet).await;
        assert_eq!(reply.code, 400);
        assert_eq!(reply.msg_id, "m1");
        assert_eq!(queue.pending_count("im.msg.process").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn out_of_range_cursor_is_bad_request() {
        let f = fixture().await;
        f.dispatcher.handle("u1", chat_packet("m1", "c1", "hi")).await;

        let pull = InputPacket {
            conversation_id: "c1".into(),
            cursor_seq: u64::MAX,
            ..InputPacket::new(Cmd::Pull)
        };
        assert_eq!(f.dispatcher.handle("u2", pull).await.code, 400);

        let ack = InputPacket {
            conversation_id: "c1".into(),
            cursor_seq: 4,
            ..InputPacket::new(Cmd::Ack)
        };
        assert!(f.dispatcher.handle("u2", ack).await.is_ok());
        let ack = InputPacket {
            conversation_id: "c1".into(),
            cursor_seq: u64::MAX,
            ..InputPacket::new(Cmd::Ack)
        };
        assert_eq!(f.dispatcher.handle("u2", ack).await.code, 400);
        let state = f.store.get_ack_state("u2", "c1").await.unwrap().unwrap();
        assert_eq!(state.last_ack_seq, 4);
    }

    #[tokio::test]
    async fn direct_chat_pushes_to_other_participant_once() {
        let f = fixture().await;
        let u1 = Arc::new(Recorder::default());
        let u2 = Arc::new(Recorder::default());
        let conns = Conns(HashMap::from([
            ("u1".to_string(), u1.clone()),
            ("u2".to_string(), u2.clone()),
        ]));
        let dispatcher = Dispatcher::new(
            Arc::new(IngestionService::new(f.store.clone())),
            Arc::new(PullService::new(f.store.clone())),
        )
        .with_push(Arc::new(PushService::new(Arc::new(conns))));

        dispatcher.handle("u1", chat_packet("m1", "private_u1_u2", "hi")).await;
        dispatcher.handle("u1", chat_packet("m1", "private_u1_u2", "hi")).await;

        assert!(u1.sent.lock().unwrap().is_empty(), "sender is not pushed");
        let pushed = u2.sent.lock().unwrap();
        assert_eq!(pushed.len(), 1, "duplicates are not pushed again");
        assert_eq!(pushed[0].seq, 1);
        assert_eq!(pushed[0].payload.as_ref().unwrap()["content"], "hi");
    }
}
