// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between the `subscriptions` table and core types.
//!
//! Timestamps are stored as whole epoch seconds, the resolution provider
//! events carry.

use chrono::{DateTime, Utc};

pub use billvault_core::types::{BillingPeriod, SubscriptionRecord, UserId};

/// Column list matching [`record_from_row`].
pub(crate) const RECORD_COLUMNS: &str = "id, user_id, customer_ref, subscription_ref, status, \
     period_start, period_end, created_at, updated_at";

pub(crate) fn to_epoch(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

fn from_epoch(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

/// Build a [`SubscriptionRecord`] from a row selected with [`RECORD_COLUMNS`].
pub(crate) fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriptionRecord> {
    Ok(SubscriptionRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        customer_ref: row.get(2)?,
        subscription_ref: row.get(3)?,
        status: row.get(4)?,
        current_period: BillingPeriod {
            start: from_epoch(row, 5)?,
            end: from_epoch(row, 6)?,
        },
        created_at: from_epoch(row, 7)?,
        updated_at: from_epoch(row, 8)?,
    })
}
