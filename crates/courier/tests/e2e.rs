// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Courier pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite and an
//! in-memory inbox. Tests are independent and order-insensitive.

use std::collections::HashSet;
use std::time::Duration;

use courier_core::types::{ChatEvent, MsgType};
use courier_core::{MessageStore, TimelineStore};
use courier_pipeline::DeliveryOutcome;
use courier_test_utils::{HarnessSeq, TestHarness};

const WAIT: Duration = Duration::from_secs(5);

fn message_seqs(packet: &courier_core::OutputPacket) -> Vec<u64> {
    packet.payload.as_ref().unwrap()["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["seq"].as_u64().unwrap())
        .collect()
}

// ---- Scenario: private chat lands in timeline and both inboxes ----

#[tokio::test]
async fn test_private_chat_is_stored_fanned_out_and_pullable() {
    let harness = TestHarness::builder().build().await.unwrap();

    let reply = harness.chat("u1", "private_u1_u2", "", "hi").await;
    assert_eq!(reply.code, 0);
    assert_eq!(reply.seq, 1);

    assert!(harness.wait_for_inbox("u1", 1, WAIT).await);
    assert!(harness.wait_for_inbox("u2", 1, WAIT).await);

    let page = harness.pull("u2", "private_u1_u2", 0).await;
    assert!(page.is_ok());
    assert_eq!(message_seqs(&page), vec![1]);
    assert_eq!(page.next_cursor_seq, 1);
    assert!(!page.has_more);

    harness.shutdown().await.unwrap();
}

// ---- Seq values are unique and increasing per conversation ----

#[tokio::test]
async fn test_concurrent_chats_get_distinct_seqs() {
    let harness = TestHarness::builder()
        .with_seq(HarnessSeq::LockedMax)
        .build()
        .await
        .unwrap();

    let msg_ids: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
    let replies = futures::future::join_all(
        msg_ids.iter().map(|id| harness.chat("u1", "private_u1_u2", id, "hi")),
    )
    .await;

    let seqs: HashSet<u64> = replies.iter().map(|r| r.seq).collect();
    assert_eq!(seqs.len(), 20);
    assert_eq!(seqs, (1..=20).collect::<HashSet<u64>>());
}

#[tokio::test]
async fn test_sequential_chats_are_strictly_increasing_with_counter() {
    let harness = TestHarness::builder()
        .with_seq(HarnessSeq::Counter)
        .build()
        .await
        .unwrap();

    let mut last = 0;
    for i in 0..10 {
        let reply = harness.chat("u1", "C", &format!("m{i}"), "hi").await;
        assert!(reply.seq > last);
        last = reply.seq;
    }

    // Conversations are sequenced independently.
    assert_eq!(harness.chat("u1", "D", "d1", "hi").await.seq, 1);
}

// ---- A repeated msg_id is stored once and keeps its seq ----

#[tokio::test]
async fn test_duplicate_msg_id_is_idempotent() {
    let harness = TestHarness::builder().build().await.unwrap();

    let first = harness.chat("u1", "private_u1_u2", "dup", "hi").await;
    let second = harness.chat("u1", "private_u1_u2", "dup", "hi").await;
    assert_eq!(first.seq, second.seq);

    let (a, b) = tokio::join!(
        harness.chat("u1", "private_u1_u2", "race", "x"),
        harness.chat("u1", "private_u1_u2", "race", "x"),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(a.seq, b.seq);

    let stored = harness.store.list_messages("private_u1_u2", 0, 50).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_duplicate_is_not_fanned_out_again() {
    let harness = TestHarness::builder().with_direct_fan_out().build().await.unwrap();

    harness.chat("u1", "private_u1_u2", "dup", "hi").await;
    harness.chat("u1", "private_u1_u2", "dup", "hi").await;

    assert_eq!(harness.inbox.successes(), 1);
    assert_eq!(harness.inbox.len("u2"), 1);
}

// ---- Ack never moves backwards ----

#[tokio::test]
async fn test_ack_is_monotonic() {
    let harness = TestHarness::builder().build().await.unwrap();

    assert!(harness.ack("u1", "C", 5).await.is_ok());
    assert!(harness.ack("u1", "C", 3).await.is_ok());

    let state = harness.store.get_ack_state("u1", "C").await.unwrap().unwrap();
    assert_eq!(state.last_ack_seq, 5);
}

// ---- Pull pagination boundary ----

#[tokio::test]
async fn test_pull_pages_with_has_more() {
    let harness = TestHarness::builder().build().await.unwrap();
    for i in 1..=3 {
        harness.chat("u1", "C", &format!("m{i}"), "hi").await;
    }

    let first = harness.pull.pull_messages("C", 0, 2).await.unwrap();
    assert_eq!(first.messages.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(first.next_cursor_seq, 2);
    assert!(first.has_more);

    let second = harness.pull.pull_messages("C", 2, 2).await.unwrap();
    assert_eq!(second.messages.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![3]);
    assert!(!second.has_more);
}

// ---- Fan-out failures are retried without failing ingestion ----

#[tokio::test]
async fn test_fan_out_retries_after_failures() {
    let harness = TestHarness::builder()
        .with_inbox_failures(2)
        .build()
        .await
        .unwrap();

    let reply = harness.chat("u1", "private_u1_u2", "m1", "hi").await;
    assert_eq!(reply.code, 0);
    assert_eq!(reply.seq, 1);

    assert!(harness.wait_for_inbox("u2", 1, WAIT).await);
    assert_eq!(harness.inbox.calls(), 3);
    assert_eq!(harness.inbox.successes(), 1);

    harness.shutdown().await.unwrap();
}

// ---- Msg_type and send_time defaults ----

#[tokio::test]
async fn test_defaults_are_applied() {
    let harness = TestHarness::builder().build().await.unwrap();

    let receipt = harness
        .ingest
        .handle_chat(ChatEvent {
            msg_id: String::new(),
            conversation_id: "C".into(),
            sender_id: "u1".into(),
            content: "hi".into(),
            msg_type: 0,
            send_time: 0,
        })
        .await
        .unwrap();
    assert!(!receipt.msg_id.is_empty());

    let stored = harness.store.find_by_msg_id(&receipt.msg_id).await.unwrap().unwrap();
    assert_eq!(stored.msg_type, MsgType::Text);
    assert!(stored.send_time > 0);
}

// ---- Queue decoupling ----

#[tokio::test]
async fn test_queued_chat_is_ingested_by_consumer() {
    let harness = TestHarness::builder().with_queue().build().await.unwrap();

    let reply = harness.chat("u1", "private_u1_u2", "", "hi").await;
    assert!(reply.is_ok());
    assert_eq!(reply.seq, 0);
    let msg_id = reply.msg_id.clone();
    assert!(harness.store.find_by_msg_id(&msg_id).await.unwrap().is_none());

    let outcomes = harness.drain_queue().await.unwrap();
    assert_eq!(outcomes, vec![DeliveryOutcome::Acked]);

    let stored = harness.store.find_by_msg_id(&msg_id).await.unwrap().unwrap();
    assert_eq!(stored.seq, 1);
    assert_eq!(stored.sender_id, "u1");
    assert!(harness.wait_for_inbox("u2", 1, WAIT).await);
}

#[tokio::test]
async fn test_redelivered_chat_keeps_its_seq() {
    let harness = TestHarness::builder().with_queue().build().await.unwrap();

    harness.chat("u1", "C", "m1", "hi").await;
    harness.chat("u1", "C", "m1", "hi").await;
    harness.chat("u1", "C", "m2", "there").await;

    let outcomes = harness.drain_queue().await.unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| *o == DeliveryOutcome::Acked));

    let stored = harness.store.list_messages("C", 0, 10).await.unwrap();
    let ids: Vec<(&str, u64)> = stored.iter().map(|m| (m.msg_id.as_str(), m.seq)).collect();
    assert_eq!(ids, vec![("m1", 1), ("m2", 2)]);
}

#[tokio::test]
async fn test_unknown_msg_type_is_refused_before_queueing() {
    let harness = TestHarness::builder().with_queue().build().await.unwrap();

    let mut packet = courier_core::InputPacket::new(courier_core::Cmd::Chat);
    packet.conversation_id = "C".into();
    packet.msg_id = "m1".into();
    packet.payload = Some(serde_json::json!({ "content": "x", "msg_type": 9 }));
    let reply = harness.dispatcher.handle("u1", packet).await;
    assert_eq!(reply.code, 400);
    assert_eq!(reply.msg_id, "m1");

    assert!(harness.drain_queue().await.unwrap().is_empty());
    assert!(harness.store.list_messages("C", 0, 10).await.unwrap().is_empty());
}

// ---- Push to online participants ----

#[tokio::test]
async fn test_online_recipient_receives_push() {
    let harness = TestHarness::builder().build().await.unwrap();
    let u2 = harness.conns.connect("u2");
    let u1 = harness.conns.connect("u1");

    harness.chat("u1", "private_u1_u2", "m1", "hi").await;

    let pushed = u2.sent_packets().await;
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].seq, 1);
    assert_eq!(pushed[0].msg_id, "m1");
    assert_eq!(u1.sent_count().await, 0);
}

// ---- Failures surface the msg_id for a safe retry ----

#[tokio::test]
async fn test_failed_ingestion_returns_msg_id() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.store.close().await.unwrap();

    let reply = harness.chat("u1", "C", "m1", "hi").await;
    assert_eq!(reply.code, 1);
    assert_eq!(reply.msg_id, "m1");
}
