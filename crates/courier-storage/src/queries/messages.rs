// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timeline message operations.

use courier_core::types::{MsgType, TimelineMessage};
use courier_core::CourierError;
use rusqlite::{ErrorCode, OptionalExtension, Row, TransactionBehavior, params};

use crate::database::Database;
use crate::queries::sequence::reserve_next_seq;

enum SaveOutcome {
    Inserted(u64),
    Duplicate,
}

const SELECT_COLUMNS: &str = "SELECT msg_id, conversation_id, seq, sender_id, content, msg_type, status, send_time
     FROM timeline_messages";

/// Persist a message, assigning its seq when `msg.seq == 0`.
///
/// The seq reservation and the insert share one `BEGIN IMMEDIATE`
/// transaction. A collision on `msg_id` rolls the transaction back and
/// yields [`CourierError::DuplicateMsgId`]; any other constraint failure is
/// a storage error.
pub async fn save_message(db: &Database, msg: &TimelineMessage) -> Result<u64, CourierError> {
    let caller_seq = super::seq_param("seq", msg.seq)?;
    let msg = msg.clone();
    let msg_id = msg.msg_id.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let seq = if caller_seq == 0 {
                reserve_next_seq(&tx, &msg.conversation_id)?
            } else {
                caller_seq
            };
            let inserted = tx.execute(
                "INSERT INTO timeline_messages
                 (msg_id, conversation_id, seq, sender_id, content, msg_type, status, send_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    msg.msg_id,
                    msg.conversation_id,
                    seq,
                    msg.sender_id,
                    msg.content,
                    msg.msg_type.as_u8(),
                    msg.status,
                    msg.send_time,
                ],
            );
            match inserted {
                Ok(_) => {
                    tx.commit()?;
                    Ok(SaveOutcome::Inserted(seq as u64))
                }
                // Dropping `tx` rolls back the reservation as well.
                Err(e) if is_msg_id_conflict(&e) => Ok(SaveOutcome::Duplicate),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        SaveOutcome::Inserted(seq) => Ok(seq),
        SaveOutcome::Duplicate => Err(CourierError::DuplicateMsgId { msg_id }),
    }
}

/// Look up a message by its idempotency key.
pub async fn find_by_msg_id(
    db: &Database,
    msg_id: &str,
) -> Result<Option<TimelineMessage>, CourierError> {
    let msg_id = msg_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE msg_id = ?1"),
                params![msg_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages of a conversation with `seq > after_seq`, ascending, at most `limit`.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    after_seq: u64,
    limit: usize,
) -> Result<Vec<TimelineMessage>, CourierError> {
    if conversation_id.is_empty() {
        return Err(CourierError::InvalidArgument(
            "conversation_id is required".to_string(),
        ));
    }
    let after_seq = super::seq_param("cursor_seq", after_seq)?;
    let conversation_id = conversation_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE conversation_id = ?1 AND seq > ?2 ORDER BY seq ASC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![conversation_id, after_seq, limit],
                message_from_row,
            )?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<TimelineMessage> {
    let seq: i64 = row.get(2)?;
    let msg_type: u8 = row.get(5)?;
    Ok(TimelineMessage {
        msg_id: row.get(0)?,
        conversation_id: row.get(1)?,
        seq: seq as u64,
        sender_id: row.get(3)?,
        content: row.get(4)?,
        msg_type: MsgType::from_wire(msg_type).unwrap_or_default(),
        status: row.get(6)?,
        send_time: row.get(7)?,
    })
}

/// True when `err` is the unique-index violation on `timeline_messages.msg_id`.
fn is_msg_id_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message)) => {
            e.code == ErrorCode::ConstraintViolation
                && message.contains("timeline_messages.msg_id")
        }
        _ => false,
    }
}
