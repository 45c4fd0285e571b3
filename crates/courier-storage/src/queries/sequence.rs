// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional per-conversation sequence reservation.

use courier_core::CourierError;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::database::Database;

/// Reserves the next seq for `conversation_id` on an open transaction.
///
/// The next value is one past the larger of the highest stored message and
/// the highest value reserved before, so a reservation whose message was
/// never saved is not handed out again. Callers must hold a write lock
/// (`BEGIN IMMEDIATE`) for the whole read-increment-write.
pub(crate) fn reserve_next_seq(conn: &Connection, conversation_id: &str) -> rusqlite::Result<i64> {
    let stored: i64 = conn.query_row(
        "SELECT COALESCE(MAX(seq), 0) FROM timeline_messages WHERE conversation_id = ?1",
        params![conversation_id],
        |row| row.get(0),
    )?;
    let reserved: i64 = conn
        .query_row(
            "SELECT last_seq FROM conversation_seq WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let next = stored.max(reserved) + 1;
    conn.execute(
        "INSERT INTO conversation_seq (conversation_id, last_seq) VALUES (?1, ?2)
         ON CONFLICT(conversation_id) DO UPDATE SET last_seq = excluded.last_seq",
        params![conversation_id, next],
    )?;
    Ok(next)
}

/// Allocates the next seq for a conversation in its own transaction.
pub async fn next_seq(db: &Database, conversation_id: &str) -> Result<u64, CourierError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let seq = reserve_next_seq(&tx, &conversation_id)?;
            tx.commit()?;
            Ok(seq as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Highest seq reserved so far for a conversation (0 when none).
pub async fn last_reserved(db: &Database, conversation_id: &str) -> Result<u64, CourierError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let last: Option<i64> = conn
                .query_row(
                    "SELECT last_seq FROM conversation_seq WHERE conversation_id = ?1",
                    params![conversation_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(last.unwrap_or(0) as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
