// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe event processing.
//!
//! Entries move `pending -> processing -> completed`. A negative
//! acknowledgement returns the entry to `pending` until `max_attempts` is
//! reached, after which it parks in `failed`. Rejected entries never return.
//! A `processing` entry whose lock has expired is claimable again.

use courier_core::{CourierError, RequeueOutcome};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use crate::database::Database;
use crate::models::QueueEntry;

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    message_id: Option<&str>,
    payload: &str,
    max_attempts: u32,
) -> Result<i64, CourierError> {
    let queue_name = queue_name.to_string();
    let message_id = message_id.map(str::to_string);
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, message_id, payload, max_attempts)
                 VALUES (?1, ?2, ?3, ?4)",
                params![queue_name, message_id, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim the oldest deliverable entry from the named queue.
///
/// Deliverable means `pending`, or `processing` with an expired lock. The
/// claimed entry is marked `processing` and locked for `visibility_secs`.
/// Returns `None` if nothing is deliverable.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    visibility_secs: u64,
) -> Result<Option<QueueEntry>, CourierError> {
    let queue_name = queue_name.to_string();
    let lock_modifier = format!("+{visibility_secs} seconds");
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let claimed = tx
                .query_row(
                    "SELECT id, queue_name, message_id, payload, status, attempts, max_attempts,
                            created_at, updated_at, locked_until
                     FROM queue
                     WHERE queue_name = ?1
                       AND (status = 'pending'
                            OR (status = 'processing'
                                AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                     ORDER BY id ASC
                     LIMIT 1",
                    params![queue_name],
                    entry_from_row,
                )
                .optional()?;

            let Some(entry) = claimed else {
                tx.commit()?;
                return Ok(None);
            };

            let locked_until: String = tx.query_row(
                "UPDATE queue SET status = 'processing',
                 locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1
                 RETURNING locked_until",
                params![entry.id, lock_modifier],
                |row| row.get(0),
            )?;
            tx.commit()?;

            Ok(Some(QueueEntry {
                status: "processing".to_string(),
                locked_until: Some(locked_until),
                ..entry
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing of a queue entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), CourierError> {
    set_terminal_status(db, id, "completed").await
}

/// Permanently discard a queue entry without retry.
pub async fn reject(db: &Database, id: i64) -> Result<(), CourierError> {
    set_terminal_status(db, id, "rejected").await
}

/// Record a failed attempt.
///
/// Increments attempts. If attempts reach max_attempts the entry is parked
/// as `failed`; otherwise it returns to `pending` with the lock cleared.
pub async fn requeue(db: &Database, id: i64) -> Result<RequeueOutcome, CourierError> {
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let row: Option<(u32, u32)> = tx
                .query_row(
                    "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((attempts, max_attempts)) = row else {
                return Ok(None);
            };

            let attempts = attempts + 1;
            let (status, outcome) = if attempts >= max_attempts {
                ("failed", RequeueOutcome::DeadLettered { attempts })
            } else {
                ("pending", RequeueOutcome::Pending { attempts })
            };
            tx.execute(
                "UPDATE queue SET status = ?1, attempts = ?2,
                 locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![status, attempts, id],
            )?;
            tx.commit()?;
            Ok(Some(outcome))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    outcome.ok_or_else(|| not_found(id))
}

/// Fetch an entry by id regardless of status.
pub async fn get_entry(db: &Database, id: i64) -> Result<Option<QueueEntry>, CourierError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, queue_name, message_id, payload, status, attempts, max_attempts,
                        created_at, updated_at, locked_until
                 FROM queue WHERE id = ?1",
                params![id],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of entries of `queue_name` currently in `status`.
pub async fn count_with_status(
    db: &Database,
    queue_name: &str,
    status: &str,
) -> Result<u64, CourierError> {
    let queue_name = queue_name.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1 AND status = ?2",
                params![queue_name, status],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

async fn set_terminal_status(
    db: &Database,
    id: i64,
    status: &'static str,
) -> Result<(), CourierError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = ?1,
                 locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![status, id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        message_id: row.get(2)?,
        payload: row.get(3)?,
        status: row.get(4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        locked_until: row.get(9)?,
    })
}

fn not_found(id: i64) -> CourierError {
    CourierError::NotFound {
        entity: "queue entry".to_string(),
        id: id.to_string(),
    }
}
