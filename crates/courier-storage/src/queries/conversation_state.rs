// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user read cursors.

use courier_core::types::UserConversationState;
use courier_core::CourierError;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

/// Record `ack_seq` for (user, conversation). The stored cursor never moves
/// backwards: an older ack leaves it untouched.
pub async fn upsert_ack(
    db: &Database,
    user_id: &str,
    conversation_id: &str,
    ack_seq: u64,
) -> Result<(), CourierError> {
    if user_id.is_empty() || conversation_id.is_empty() {
        return Err(CourierError::InvalidArgument(
            "user_id and conversation_id are required".to_string(),
        ));
    }
    let ack_seq = super::seq_param("ack_seq", ack_seq)?;
    let user_id = user_id.to_string();
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_conversation_state (user_id, conversation_id, last_ack_seq)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, conversation_id) DO UPDATE SET
                     last_ack_seq = MAX(last_ack_seq, excluded.last_ack_seq),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![user_id, conversation_id, ack_seq],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch the stored cursor for (user, conversation).
pub async fn get_ack_state(
    db: &Database,
    user_id: &str,
    conversation_id: &str,
) -> Result<Option<UserConversationState>, CourierError> {
    let user_id = user_id.to_string();
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, conversation_id, last_ack_seq, updated_at
                 FROM user_conversation_state
                 WHERE user_id = ?1 AND conversation_id = ?2",
                params![user_id, conversation_id],
                |row| {
                    let last_ack_seq: i64 = row.get(2)?;
                    Ok(UserConversationState {
                        user_id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        last_ack_seq: last_ack_seq as u64,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
