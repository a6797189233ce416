// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billing event constructors with fixed 30-day periods.

use billvault_billing::{BillingEvent, BillingEventKind};
use billvault_core::UserId;

const PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// A checkout completion for `user` at `occurred_at`.
pub fn checkout(user: &str, subscription_ref: &str, occurred_at: i64) -> BillingEvent {
    BillingEvent {
        kind: BillingEventKind::CheckoutCompleted,
        event_id: Some(format!("evt_checkout_{occurred_at}")),
        subscription_ref: Some(subscription_ref.to_string()),
        user_id: Some(UserId::from(user)),
        customer_ref: Some(format!("cus_{user}")),
        status: Some("active".to_string()),
        period_start: Some(occurred_at),
        period_end: Some(occurred_at + PERIOD_SECS),
        occurred_at,
    }
}

/// A non-checkout event of `kind` moving `subscription_ref` to `status`.
pub fn change(
    kind: BillingEventKind,
    subscription_ref: &str,
    status: &str,
    occurred_at: i64,
) -> BillingEvent {
    BillingEvent {
        kind,
        event_id: Some(format!("evt_{kind}_{occurred_at}")),
        subscription_ref: Some(subscription_ref.to_string()),
        user_id: None,
        customer_ref: None,
        status: Some(status.to_string()),
        period_start: Some(occurred_at),
        period_end: Some(occurred_at + PERIOD_SECS),
        occurred_at,
    }
}
