// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Every function takes `&Database` and runs its
//! statements on the single writer thread.

use courier_core::CourierError;

pub mod conversation_state;
pub mod messages;
pub mod queue;
pub mod sequence;

/// Convert a wire `u64` (seq or cursor) to the `INTEGER` SQLite stores.
pub(crate) fn seq_param(field: &str, value: u64) -> Result<i64, CourierError> {
    i64::try_from(value)
        .map_err(|_| CourierError::InvalidArgument(format!("{field} {value} is out of range")))
}
