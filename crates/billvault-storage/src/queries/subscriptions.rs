// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription record operations.
//!
//! Each operation runs as one closure on the writer thread, so the
//! compare-then-write in [`apply_change`] cannot interleave with another write.

use billvault_core::types::{
    ChangeOutcome, CheckoutSnapshot, SubscriptionChange, SubscriptionRecord, UpsertOutcome,
    UserId,
};
use billvault_core::BillvaultError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{record_from_row, to_epoch, RECORD_COLUMNS};

enum UpsertResult {
    Done(UpsertOutcome),
    Stale(i64),
    RefHeldBy(String),
}

/// Create the user's record or overwrite its refs, status and period.
///
/// A checkout for the subscription the record already tracks is dropped
/// when the record is strictly newer, so a redelivered checkout cannot undo
/// a later change. A checkout for a different subscription always replaces
/// the record. A subscription reference already mirrored for a different
/// user is rejected as a validation error.
pub async fn upsert_checkout(
    db: &Database,
    checkout: &CheckoutSnapshot,
) -> Result<UpsertOutcome, BillvaultError> {
    let checkout = checkout.clone();
    let user_id = checkout.user_id.clone();
    let subscription_ref = checkout.subscription_ref.clone();
    let new_id = uuid::Uuid::new_v4().to_string();
    let now = to_epoch(Utc::now());

    let result = db
        .connection()
        .call(move |conn| -> Result<UpsertResult, rusqlite::Error> {
            let tx = conn.transaction()?;

            let holder: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM subscriptions WHERE subscription_ref = ?1",
                    params![checkout.subscription_ref],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(holder) = holder
                && holder != checkout.user_id.as_str()
            {
                return Ok(UpsertResult::RefHeldBy(holder));
            }

            let current: Option<(String, i64)> = tx
                .query_row(
                    "SELECT subscription_ref, updated_at FROM subscriptions WHERE user_id = ?1",
                    params![checkout.user_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let occurred = to_epoch(checkout.occurred_at);
            if let Some((tracked_ref, recorded)) = &current
                && *tracked_ref == checkout.subscription_ref
                && *recorded > occurred
            {
                return Ok(UpsertResult::Stale(*recorded));
            }

            tx.execute(
                "INSERT INTO subscriptions (id, user_id, customer_ref, subscription_ref, status,
                     period_start, period_end, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id) DO UPDATE SET
                     customer_ref = excluded.customer_ref,
                     subscription_ref = excluded.subscription_ref,
                     status = excluded.status,
                     period_start = excluded.period_start,
                     period_end = excluded.period_end,
                     updated_at = excluded.updated_at",
                params![
                    new_id,
                    checkout.user_id.as_str(),
                    checkout.customer_ref,
                    checkout.subscription_ref,
                    checkout.status,
                    to_epoch(checkout.period.start),
                    to_epoch(checkout.period.end),
                    now,
                    occurred,
                ],
            )?;
            tx.commit()?;

            Ok(UpsertResult::Done(if current.is_some() {
                UpsertOutcome::Replaced
            } else {
                UpsertOutcome::Created
            }))
        })
        .await
        .map_err(map_tr_err)?;

    match result {
        UpsertResult::Done(outcome) => Ok(outcome),
        UpsertResult::Stale(recorded) => DateTime::from_timestamp(recorded, 0)
            .map(|recorded_at| UpsertOutcome::Stale { recorded_at })
            .ok_or_else(|| out_of_range(recorded)),
        UpsertResult::RefHeldBy(holder) => Err(BillvaultError::Validation(format!(
            "subscription {subscription_ref} is already mirrored for user {holder}, not {user_id}"
        ))),
    }
}

/// Apply a status/period change unless the stored record is strictly newer.
pub async fn apply_change(
    db: &Database,
    change: &SubscriptionChange,
) -> Result<ChangeOutcome, BillvaultError> {
    let change = change.clone();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Option<ChangeOutcome>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let recorded: Option<i64> = tx
                .query_row(
                    "SELECT updated_at FROM subscriptions WHERE subscription_ref = ?1",
                    params![change.subscription_ref],
                    |row| row.get(0),
                )
                .optional()?;

            let occurred = to_epoch(change.occurred_at);
            let outcome = match recorded {
                None => Some(ChangeOutcome::Untracked),
                Some(recorded) if occurred < recorded => {
                    DateTime::from_timestamp(recorded, 0)
                        .map(|recorded_at| ChangeOutcome::Stale { recorded_at })
                }
                Some(_) => {
                    tx.execute(
                        "UPDATE subscriptions
                         SET status = ?2, period_start = ?3, period_end = ?4, updated_at = ?5
                         WHERE subscription_ref = ?1 AND updated_at <= ?5",
                        params![
                            change.subscription_ref,
                            change.status,
                            to_epoch(change.period.start),
                            to_epoch(change.period.end),
                            occurred,
                        ],
                    )?;
                    Some(ChangeOutcome::Applied)
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)?;

    outcome.ok_or_else(|| BillvaultError::Internal("stored updated_at is out of range".into()))
}

fn out_of_range(epoch: i64) -> BillvaultError {
    BillvaultError::Internal(format!("stored updated_at {epoch} is out of range"))
}

/// Get the record owned by `user_id`.
pub async fn get_by_user(
    db: &Database,
    user_id: &UserId,
) -> Result<Option<SubscriptionRecord>, BillvaultError> {
    let user_id = user_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SubscriptionRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM subscriptions WHERE user_id = ?1"),
                params![user_id],
                record_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Get the record tracking the provider subscription `subscription_ref`.
pub async fn get_by_subscription_ref(
    db: &Database,
    subscription_ref: &str,
) -> Result<Option<SubscriptionRecord>, BillvaultError> {
    let subscription_ref = subscription_ref.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SubscriptionRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM subscriptions WHERE subscription_ref = ?1"),
                params![subscription_ref],
                record_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
